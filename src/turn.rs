//! Turn state machine.
//!
//! A turn graph is data: named states, each with an ordered list of
//! behaviours, and transitions keyed by `(state, trigger)`. Behaviours run in
//! order when their state is entered and are polled on every later tick; they
//! drive the tile manager and input manager and fire triggers when their work
//! is done. The first queued trigger with a transition from the current state
//! wins; the others are dropped.

use crate::error::EngineError;
use crate::input::{InputManager, Swap};
use crate::tile_manager::TileManager;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Upper bound on transitions resolved within one tick.
const MAX_TRANSITIONS_PER_TICK: usize = 32;

/// Where `CheckAndCacheMatches` looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Only the lines through the last swapped pair.
    CachedInputTiles,
    WholeGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    Equal,
    LessThan,
}

impl Comparison {
    pub fn holds(self, lhs: usize, rhs: usize) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Equal => lhs == rhs,
            Self::LessThan => lhs < rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    SetTrigger(String),
    /// Fire `trigger` after `seconds` in the state. Restarts on every entry.
    Wait {
        seconds: f32,
        trigger: String,
    },
    CheckAndCacheMatches(MatchSource),
    ApplyGravityEffectToTiles {
        finish: String,
    },
    CollapseTiles,
    ClearMatchedTiles,
    FillGridWithTiles {
        avoid_matches: bool,
    },
    /// Evaluate input while in the state; fire `swap_trigger` on a swap.
    ProcessUserInput {
        swap_trigger: String,
    },
    QuantityOfMatchedTilesCompare {
        comparison: Comparison,
        target: usize,
        on_true: Option<String>,
        on_false: Option<String>,
    },
    /// Swap (or undo) the last swapped pair and move both tiles over `move_time`.
    ExecuteSwapAndMoveTilesToNewPosition {
        undo: bool,
        move_time: f32,
    },
    ActivateSwappedTiles,
    AnimateSwapOfInputFeedbackCursor {
        time: f32,
        wait_for_completion: bool,
        finish: String,
    },
}

/// Mutable collaborators a behaviour acts on.
pub struct TurnContext<'a> {
    pub tiles: &'a mut TileManager,
    pub input: &'a mut InputManager,
}

impl TurnContext<'_> {
    fn last_swap(&self) -> Result<Swap, EngineError> {
        self.input.last_swap().ok_or(EngineError::NoSwapRecorded)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    elapsed: f32,
    fired: bool,
}

impl Behaviour {
    fn enter(
        &self,
        progress: &mut Progress,
        ctx: &mut TurnContext<'_>,
        fire: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        *progress = Progress::default();
        match self {
            Self::SetTrigger(trigger) => fire.push(trigger.clone()),
            Self::Wait { .. } => {}
            Self::CheckAndCacheMatches(MatchSource::CachedInputTiles) => {
                let swap = ctx.last_swap()?;
                ctx.tiles.check_and_cache_matches_from_tiles(swap.a, swap.b)?;
            }
            Self::CheckAndCacheMatches(MatchSource::WholeGrid) => {
                ctx.tiles.check_and_cache_matches_in_whole_grid()?;
            }
            Self::ApplyGravityEffectToTiles { .. } => {
                ctx.tiles.apply_gravity_to_all_tiles();
            }
            Self::CollapseTiles => {
                ctx.tiles.collapse_tiles()?;
            }
            Self::ClearMatchedTiles => {
                ctx.tiles.clear_matched_tiles()?;
            }
            Self::FillGridWithTiles { avoid_matches } => {
                ctx.tiles.fill_board()?;
                if *avoid_matches {
                    ctx.tiles.mutate_until_no_matches()?;
                }
                ctx.tiles.finalize_spawn();
            }
            Self::ProcessUserInput { .. } => ctx.input.start_processing_input(),
            Self::QuantityOfMatchedTilesCompare {
                comparison,
                target,
                on_true,
                on_false,
            } => {
                let count = ctx.tiles.matched_count();
                let outcome = comparison.holds(count, *target);
                debug!(count, target, outcome, "compare matched tiles");
                if let Some(trigger) = if outcome { on_true } else { on_false } {
                    fire.push(trigger.clone());
                }
            }
            Self::ExecuteSwapAndMoveTilesToNewPosition { undo, move_time } => {
                let swap = ctx.last_swap()?;
                if *undo {
                    ctx.tiles.undo_swap(swap.a, swap.b)?;
                    info!(a = %swap.a, b = %swap.b, "swap rejected");
                } else {
                    ctx.tiles.swap(swap.a, swap.b)?;
                }
                ctx.tiles.animate_to_cell(swap.a, *move_time)?;
                ctx.tiles.animate_to_cell(swap.b, *move_time)?;
            }
            Self::ActivateSwappedTiles => {
                let swap = ctx.last_swap()?;
                ctx.tiles.activate(swap.a, swap.b)?;
                ctx.tiles.activate(swap.b, swap.a)?;
            }
            Self::AnimateSwapOfInputFeedbackCursor {
                time,
                wait_for_completion,
                finish,
            } => {
                if !ctx.input.animate_cursor_indicate_swap(ctx.tiles, *time) {
                    return Err(EngineError::NoSwapRecorded);
                }
                if !*wait_for_completion {
                    progress.fired = true;
                    fire.push(finish.clone());
                }
            }
        }
        Ok(())
    }

    fn update(
        &self,
        progress: &mut Progress,
        dt: f32,
        ctx: &mut TurnContext<'_>,
        fire: &mut Vec<String>,
    ) {
        if progress.fired {
            return;
        }
        let trigger = match self {
            Self::Wait { seconds, trigger } => {
                progress.elapsed += dt;
                (progress.elapsed >= *seconds).then_some(trigger)
            }
            Self::ApplyGravityEffectToTiles { finish } => {
                ctx.tiles.take_gravity_complete().then_some(finish)
            }
            Self::ProcessUserInput { swap_trigger } => {
                ctx.input.take_swap().map(|_| swap_trigger)
            }
            Self::AnimateSwapOfInputFeedbackCursor { finish, .. } => {
                ctx.input.take_cursor_animation_done().then_some(finish)
            }
            _ => None,
        };
        if let Some(trigger) = trigger {
            progress.fired = true;
            fire.push(trigger.clone());
        }
    }

    fn exit(&self, ctx: &mut TurnContext<'_>) {
        if let Self::ProcessUserInput { .. } = self {
            ctx.input.stop_processing_input();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateSpec {
    pub name: String,
    pub behaviours: Vec<Behaviour>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub trigger: String,
    pub to: String,
}

/// Pacing of the animated parts of a turn, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnTimings {
    pub indicate_swap: f32,
    pub swap_move: f32,
    pub clear_pause: f32,
}

impl Default for TurnTimings {
    fn default() -> Self {
        Self {
            indicate_swap: 0.15,
            swap_move: 0.2,
            clear_pause: 0.25,
        }
    }
}

impl TurnTimings {
    /// No pauses: every animated step completes on the next tick.
    pub fn instant() -> Self {
        Self {
            indicate_swap: 0.0,
            swap_move: 0.0,
            clear_pause: 0.0,
        }
    }
}

/// State names of [`TurnGraph::standard`].
pub mod states {
    pub const FILL_INITIAL: &str = "FillInitial";
    pub const SETTLE_INITIAL: &str = "SettleInitial";
    pub const AWAIT_INPUT: &str = "AwaitInput";
    pub const INDICATE_SWAP: &str = "IndicateSwap";
    pub const SWAP: &str = "Swap";
    pub const ACTIVATE: &str = "Activate";
    pub const UNSWAP: &str = "Unswap";
    pub const CLEAR: &str = "Clear";
    pub const COLLAPSE: &str = "Collapse";
    pub const CASCADE: &str = "Cascade";
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnGraph {
    initial: String,
    states: Vec<StateSpec>,
    transitions: Vec<Transition>,
}

impl TurnGraph {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn state(mut self, name: impl Into<String>, behaviours: Vec<Behaviour>) -> Self {
        self.states.push(StateSpec {
            name: name.into(),
            behaviours,
        });
        self
    }

    pub fn transition(
        mut self,
        from: impl Into<String>,
        trigger: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.transitions.push(Transition {
            from: from.into(),
            trigger: trigger.into(),
            to: to.into(),
        });
        self
    }

    fn index_of(&self, name: &str) -> Result<usize, EngineError> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| EngineError::UnknownState(name.to_string()))
    }

    fn validate(&self) -> Result<(), EngineError> {
        self.index_of(&self.initial)?;
        for t in &self.transitions {
            self.index_of(&t.from)?;
            self.index_of(&t.to)?;
        }
        Ok(())
    }

    /// Full turn: fill without matches, settle, then loop over
    /// input, swap, match check, and either clear/collapse/refill with cascade
    /// checks or undo the swap.
    pub fn standard(timings: &TurnTimings) -> Self {
        use states::*;
        let t = |s: &str| s.to_string();
        Self::new(FILL_INITIAL)
            .state(
                FILL_INITIAL,
                vec![
                    Behaviour::FillGridWithTiles { avoid_matches: true },
                    Behaviour::SetTrigger(t("filled")),
                ],
            )
            .state(
                SETTLE_INITIAL,
                vec![Behaviour::ApplyGravityEffectToTiles { finish: t("settled") }],
            )
            .state(
                AWAIT_INPUT,
                vec![Behaviour::ProcessUserInput {
                    swap_trigger: t("swap"),
                }],
            )
            .state(
                INDICATE_SWAP,
                vec![Behaviour::AnimateSwapOfInputFeedbackCursor {
                    time: timings.indicate_swap,
                    wait_for_completion: true,
                    finish: t("indicated"),
                }],
            )
            .state(
                SWAP,
                vec![
                    Behaviour::ExecuteSwapAndMoveTilesToNewPosition {
                        undo: false,
                        move_time: timings.swap_move,
                    },
                    Behaviour::Wait {
                        seconds: timings.swap_move,
                        trigger: t("moved"),
                    },
                ],
            )
            .state(
                ACTIVATE,
                vec![
                    Behaviour::ActivateSwappedTiles,
                    Behaviour::CheckAndCacheMatches(MatchSource::CachedInputTiles),
                    Behaviour::QuantityOfMatchedTilesCompare {
                        comparison: Comparison::GreaterThan,
                        target: 0,
                        on_true: Some(t("matched")),
                        on_false: Some(t("no_match")),
                    },
                ],
            )
            .state(
                UNSWAP,
                vec![
                    Behaviour::ExecuteSwapAndMoveTilesToNewPosition {
                        undo: true,
                        move_time: timings.swap_move,
                    },
                    Behaviour::Wait {
                        seconds: timings.swap_move,
                        trigger: t("moved"),
                    },
                ],
            )
            .state(
                CLEAR,
                vec![
                    Behaviour::ClearMatchedTiles,
                    Behaviour::Wait {
                        seconds: timings.clear_pause,
                        trigger: t("cleared"),
                    },
                ],
            )
            .state(
                COLLAPSE,
                vec![
                    Behaviour::CollapseTiles,
                    Behaviour::FillGridWithTiles {
                        avoid_matches: false,
                    },
                    Behaviour::ApplyGravityEffectToTiles { finish: t("settled") },
                ],
            )
            .state(
                CASCADE,
                vec![
                    Behaviour::CheckAndCacheMatches(MatchSource::WholeGrid),
                    Behaviour::QuantityOfMatchedTilesCompare {
                        comparison: Comparison::GreaterThan,
                        target: 0,
                        on_true: Some(t("matched")),
                        on_false: Some(t("stable")),
                    },
                ],
            )
            .transition(FILL_INITIAL, "filled", SETTLE_INITIAL)
            .transition(SETTLE_INITIAL, "settled", AWAIT_INPUT)
            .transition(AWAIT_INPUT, "swap", INDICATE_SWAP)
            .transition(INDICATE_SWAP, "indicated", SWAP)
            .transition(SWAP, "moved", ACTIVATE)
            .transition(ACTIVATE, "matched", CLEAR)
            .transition(ACTIVATE, "no_match", UNSWAP)
            .transition(UNSWAP, "moved", AWAIT_INPUT)
            .transition(CLEAR, "cleared", COLLAPSE)
            .transition(COLLAPSE, "settled", CASCADE)
            .transition(CASCADE, "matched", CLEAR)
            .transition(CASCADE, "stable", AWAIT_INPUT)
    }
}

#[derive(Debug)]
pub struct TurnMachine {
    graph: TurnGraph,
    current: usize,
    progress: Vec<Progress>,
    pending: VecDeque<String>,
    entered: bool,
}

impl TurnMachine {
    pub fn new(graph: TurnGraph) -> Result<Self, EngineError> {
        graph.validate()?;
        let current = graph.index_of(&graph.initial)?;
        Ok(Self {
            progress: vec![Progress::default(); graph.states[current].behaviours.len()],
            graph,
            current,
            pending: VecDeque::new(),
            entered: false,
        })
    }

    pub fn current_state(&self) -> &str {
        &self.graph.states[self.current].name
    }

    /// Queue a trigger as if a behaviour had fired it.
    pub fn fire(&mut self, trigger: impl Into<String>) {
        self.pending.push_back(trigger.into());
    }

    /// Enter the initial state on the first call, otherwise poll the current
    /// state's behaviours; then follow any transitions their triggers select.
    pub fn tick(&mut self, dt: f32, ctx: &mut TurnContext<'_>) -> Result<(), EngineError> {
        let mut fired = Vec::new();
        if self.entered {
            let state = &self.graph.states[self.current];
            for (behaviour, progress) in state.behaviours.iter().zip(self.progress.iter_mut()) {
                behaviour.update(progress, dt, ctx, &mut fired);
            }
            self.pending.extend(fired);
        } else {
            let tiles = ctx.tiles.clone();
            let input = ctx.input.clone();
            if let Err(err) = self.enter_current(ctx) {
                *ctx.tiles = tiles;
                *ctx.input = input;
                return Err(err);
            }
            self.entered = true;
        }

        for _ in 0..MAX_TRANSITIONS_PER_TICK {
            let Some(next) = self.next_transition() else {
                break;
            };
            self.pending.clear();
            self.transition_to(next, ctx)?;
        }
        Ok(())
    }

    /// Exit the current state and enter `next`. On failure the board, the
    /// input and the machine are put back as they were before the exit.
    fn transition_to(&mut self, next: usize, ctx: &mut TurnContext<'_>) -> Result<(), EngineError> {
        let tiles = ctx.tiles.clone();
        let input = ctx.input.clone();
        let (previous, progress) = (self.current, self.progress.clone());

        for behaviour in &self.graph.states[self.current].behaviours {
            behaviour.exit(ctx);
        }
        debug!(
            from = self.current_state(),
            to = %self.graph.states[next].name,
            "turn transition"
        );
        self.current = next;
        if let Err(err) = self.enter_current(ctx) {
            warn!(
                %err,
                state = %self.graph.states[previous].name,
                "transition aborted"
            );
            *ctx.tiles = tiles;
            *ctx.input = input;
            self.current = previous;
            self.progress = progress;
            self.pending.clear();
            return Err(err);
        }
        Ok(())
    }

    fn enter_current(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), EngineError> {
        let state = &self.graph.states[self.current];
        self.progress = vec![Progress::default(); state.behaviours.len()];
        let mut fired = Vec::new();
        for (behaviour, progress) in state.behaviours.iter().zip(self.progress.iter_mut()) {
            behaviour.enter(progress, ctx, &mut fired)?;
        }
        self.pending.extend(fired);
        Ok(())
    }

    /// Pop triggers until one has a transition from the current state.
    fn next_transition(&mut self) -> Option<usize> {
        while let Some(trigger) = self.pending.pop_front() {
            let from = self.current_state();
            let target = self
                .graph
                .transitions
                .iter()
                .find(|t| t.from == from && t.trigger == trigger)
                .and_then(|t| self.graph.index_of(&t.to).ok());
            match target {
                Some(next) => return Some(next),
                None => warn!(state = from, %trigger, "dropped trigger without transition"),
            }
        }
        None
    }
}
