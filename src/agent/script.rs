//! Post-accident support script
//!
//! The step sequence lives in code. The model only writes the content of a
//! step that [`ScriptState::plan`] has already chosen, so steps cannot be
//! skipped or repeated by a model that drifts from its instructions.

use serde::{Deserialize, Serialize};

use crate::core::config::{EntryMode, ScriptConfig};

/// One step of the support script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStep {
    /// Waiting for the conversation to start
    Init,
    /// Tell the occupant what the vehicle reports
    SituationSummary,
    /// Ask how the occupant is doing physically and emotionally
    EmotionalCheck,
    /// Ask about other occupants and whether leaving the vehicle is safe
    OccupantSafetyCheck,
    /// Ask whether emergency services have been contacted
    EmergencyContactCheck,
    /// Advise staying inside when injured without critical hazards
    Advisory,
    /// Answer whatever the occupant asks
    FreeForm,
}

impl SupportStep {
    /// Scripted steps in the order they are worked through
    pub const SEQUENCE: [SupportStep; 5] = [
        SupportStep::SituationSummary,
        SupportStep::EmotionalCheck,
        SupportStep::OccupantSafetyCheck,
        SupportStep::EmergencyContactCheck,
        SupportStep::Advisory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportStep::Init => "init",
            SupportStep::SituationSummary => "situation_summary",
            SupportStep::EmotionalCheck => "emotional_check",
            SupportStep::OccupantSafetyCheck => "occupant_safety_check",
            SupportStep::EmergencyContactCheck => "emergency_contact_check",
            SupportStep::Advisory => "advisory",
            SupportStep::FreeForm => "free_form",
        }
    }

    /// Whether this step needs the vehicle situation
    pub fn needs_situation(&self) -> bool {
        matches!(self, SupportStep::SituationSummary)
    }
}

impl std::fmt::Display for SupportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the script starts
#[derive(Debug, Clone)]
pub struct EntryPolicy {
    mode: EntryMode,
    triggers: Vec<String>,
}

impl EntryPolicy {
    pub fn immediate() -> Self {
        Self {
            mode: EntryMode::Immediate,
            triggers: Vec::new(),
        }
    }

    pub fn trigger<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: EntryMode::Trigger,
            triggers: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ScriptConfig) -> Self {
        match config.entry {
            EntryMode::Immediate => Self::immediate(),
            EntryMode::Trigger => Self::trigger(config.trigger_phrases.iter().cloned()),
        }
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Whether `input` starts the script
    pub fn admits(&self, input: &str) -> bool {
        match self.mode {
            EntryMode::Immediate => true,
            EntryMode::Trigger => {
                let words: Vec<String> = input
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(str::to_lowercase)
                    .collect();
                self.triggers.iter().any(|phrase| {
                    let needle: Vec<&str> = phrase.split_whitespace().collect();
                    !needle.is_empty()
                        && words
                            .windows(needle.len())
                            .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
                })
            }
        }
    }
}

impl Default for EntryPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "can", "could", "should", "will",
    "would", "is", "are", "do", "does", "did",
];

/// Whether the occupant asked something instead of answering the script
pub fn is_off_script(input: &str) -> bool {
    let input = input.trim();
    if input.contains('?') {
        return true;
    }
    input
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .is_some_and(|w| QUESTION_WORDS.contains(&w.as_str()))
}

/// What the supervisor does with a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPlan {
    /// Not triggered yet, nothing to say
    Standby,
    Step(SupportStep),
}

/// Script progress stored with the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    current: Option<SupportStep>,
    #[serde(default)]
    completed: Vec<SupportStep>,
}

impl ScriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step last worked on, [`SupportStep::Init`] before the first turn
    pub fn current(&self) -> SupportStep {
        self.current.unwrap_or(SupportStep::Init)
    }

    pub fn completed(&self) -> &[SupportStep] {
        &self.completed
    }

    pub fn started(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_complete(&self, step: SupportStep) -> bool {
        self.completed.contains(&step)
    }

    /// First scripted step not yet completed
    pub fn next_incomplete(&self) -> Option<SupportStep> {
        SupportStep::SEQUENCE
            .into_iter()
            .find(|step| !self.is_complete(*step))
    }

    /// Choose the step for this turn without changing state
    pub fn plan(&self, input: &str, entry: &EntryPolicy) -> TurnPlan {
        if !self.started() {
            if !entry.admits(input) {
                return TurnPlan::Standby;
            }
            return TurnPlan::Step(SupportStep::SituationSummary);
        }
        // an empty turn answers nothing, so it must not consume a step
        if input.trim().is_empty() || is_off_script(input) {
            return TurnPlan::Step(SupportStep::FreeForm);
        }
        TurnPlan::Step(self.next_incomplete().unwrap_or(SupportStep::FreeForm))
    }

    /// Record a finished turn; advances at most one step
    pub fn commit(&mut self, step: SupportStep) {
        self.current = Some(step);
        if step != SupportStep::FreeForm && step != SupportStep::Init && !self.is_complete(step) {
            self.completed.push(step);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: &mut ScriptState, input: &str) -> TurnPlan {
        let plan = state.plan(input, &EntryPolicy::immediate());
        if let TurnPlan::Step(step) = plan {
            state.commit(step);
        }
        plan
    }

    #[test]
    fn test_steps_advance_one_per_turn() {
        let mut state = ScriptState::new();
        assert_eq!(state.current(), SupportStep::Init);

        let expected = [
            SupportStep::SituationSummary,
            SupportStep::EmotionalCheck,
            SupportStep::OccupantSafetyCheck,
            SupportStep::EmergencyContactCheck,
            SupportStep::Advisory,
            SupportStep::FreeForm,
            SupportStep::FreeForm,
        ];
        for step in expected {
            assert_eq!(run(&mut state, "ok"), TurnPlan::Step(step));
        }
        assert_eq!(state.completed().len(), 5);
    }

    #[test]
    fn test_question_branches_then_resumes() {
        let mut state = ScriptState::new();
        run(&mut state, "help, I crashed");
        run(&mut state, "I'm shaken but fine");

        assert_eq!(
            run(&mut state, "Is it safe to call my wife?"),
            TurnPlan::Step(SupportStep::FreeForm)
        );
        assert_eq!(
            run(&mut state, "thanks"),
            TurnPlan::Step(SupportStep::OccupantSafetyCheck)
        );
    }

    #[test]
    fn test_empty_turn_keeps_pending_step() {
        let mut state = ScriptState::new();
        run(&mut state, "help");

        assert_eq!(run(&mut state, "   "), TurnPlan::Step(SupportStep::FreeForm));
        assert!(!state.is_complete(SupportStep::EmotionalCheck));
        assert_eq!(
            run(&mut state, "a bit shaken"),
            TurnPlan::Step(SupportStep::EmotionalCheck)
        );
    }

    #[test]
    fn test_first_question_still_starts_script() {
        let mut state = ScriptState::new();
        assert_eq!(
            run(&mut state, "what happened?"),
            TurnPlan::Step(SupportStep::SituationSummary)
        );
    }

    #[test]
    fn test_completed_steps_never_repeat() {
        let mut state = ScriptState::new();
        state.commit(SupportStep::SituationSummary);
        state.commit(SupportStep::SituationSummary);
        assert_eq!(state.completed(), &[SupportStep::SituationSummary]);
        assert_eq!(state.next_incomplete(), Some(SupportStep::EmotionalCheck));
    }

    #[test]
    fn test_trigger_entry() {
        let entry = EntryPolicy::trigger(["help", "emergency", "evana"]);
        let state = ScriptState::new();

        assert_eq!(state.plan("hello there", &entry), TurnPlan::Standby);
        assert_eq!(state.plan("helpful", &entry), TurnPlan::Standby);
        assert_eq!(
            state.plan("HELP me please", &entry),
            TurnPlan::Step(SupportStep::SituationSummary)
        );
        assert!(entry.admits("Hey Evana!"));
    }

    #[test]
    fn test_off_script_detection() {
        assert!(is_off_script("Where is the nearest hospital?"));
        assert!(is_off_script("how long until help arrives"));
        assert!(!is_off_script("I am okay"));
        assert!(!is_off_script(""));
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let mut state = ScriptState::new();
        state.commit(SupportStep::SituationSummary);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["current"], "situation_summary");
        assert_eq!(json["completed"][0], "situation_summary");

        let back: ScriptState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
