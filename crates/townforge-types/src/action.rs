//! Agent actions: the discriminated union the decision engine produces
//! and the execution dispatcher consumes.
//!
//! An [`Action`] carries its [`ActionType`] discriminant alongside a typed
//! [`ActionParams`] bag and the agent's free-text reasoning. The model's
//! untyped `details` object is coerced into [`ActionParams`] by the
//! decision crate's per-variant extractors; by the time an action reaches
//! the dispatcher every parameter is typed.

use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, GameType, SkillKind};
use crate::ids::PlotId;

/// Action-specific parameters carried by an [`Action`].
///
/// Each variant corresponds to one [`ActionType`]. Optional fields are
/// genuinely optional at decision time; the dispatcher resolves or
/// rejects them per its lenient/strict mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionParams {
    /// Parameters for [`ActionType::BuyArena`].
    BuyArena {
        /// Reserve units to swap in.
        amount_in: i64,
        /// Why the agent is trading now.
        why: Option<String>,
        /// What the agent plans to do with the proceeds.
        next_action: Option<String>,
    },
    /// Parameters for [`ActionType::SellArena`].
    SellArena {
        /// $ARENA units to swap out.
        amount_in: i64,
        /// Why the agent is trading now.
        why: Option<String>,
        /// What the agent plans to do with the proceeds.
        next_action: Option<String>,
    },
    /// Parameters for [`ActionType::ClaimPlot`].
    ClaimPlot {
        /// Index of the plot to claim within the active town.
        plot_index: Option<u32>,
    },
    /// Parameters for [`ActionType::StartBuild`].
    StartBuild {
        /// Free-text building concept (e.g. "herbalist's apothecary").
        building_type: String,
        /// Target plot by ID, if known.
        plot_id: Option<PlotId>,
        /// Target plot by index, if known.
        plot_index: Option<u32>,
    },
    /// Parameters for [`ActionType::DoWork`].
    DoWork {
        /// Target plot by ID, if known.
        plot_id: Option<PlotId>,
        /// Target plot by index, if known.
        plot_index: Option<u32>,
    },
    /// Parameters for [`ActionType::CompleteBuild`].
    CompleteBuild {
        /// Target plot by ID, if known.
        plot_id: Option<PlotId>,
        /// Target plot by index, if known.
        plot_index: Option<u32>,
    },
    /// Parameters for [`ActionType::PlayArena`].
    PlayArena {
        /// Requested game variant; defaults to poker downstream.
        game_type: Option<GameType>,
        /// Requested wager in $ARENA; defaults downstream.
        wager: Option<i64>,
        /// Preferred opponent by name, if any.
        opponent: Option<String>,
    },
    /// Parameters for [`ActionType::TransferArena`].
    TransferArena {
        /// Recipient agent name (matched case-insensitively).
        to_name: String,
        /// $ARENA amount to send; must be a positive integer.
        amount: i64,
        /// Optional note carried into the transfer event.
        memo: Option<String>,
    },
    /// Parameters for [`ActionType::BuySkill`].
    BuySkill {
        /// Which paid skill to buy.
        skill: SkillKind,
        /// The question put to the oracle.
        question: String,
        /// Why the agent needs the answer this tick.
        why_now: Option<String>,
        /// What the agent intends to do with the answer.
        expected_next_action: Option<String>,
        /// Conditional plan ("if X then Y") recorded with the purchase.
        if_then: Option<String>,
        /// Skill-specific parameter bag forwarded verbatim.
        params: serde_json::Value,
    },
    /// Parameters for [`ActionType::Mine`] (legacy; always redirected).
    Mine,
    /// Parameters for [`ActionType::Rest`].
    Rest,
}

impl ActionParams {
    /// The [`ActionType`] this parameter bag belongs to.
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::BuyArena { .. } => ActionType::BuyArena,
            Self::SellArena { .. } => ActionType::SellArena,
            Self::ClaimPlot { .. } => ActionType::ClaimPlot,
            Self::StartBuild { .. } => ActionType::StartBuild,
            Self::DoWork { .. } => ActionType::DoWork,
            Self::CompleteBuild { .. } => ActionType::CompleteBuild,
            Self::PlayArena { .. } => ActionType::PlayArena,
            Self::TransferArena { .. } => ActionType::TransferArena,
            Self::BuySkill { .. } => ActionType::BuySkill,
            Self::Mine => ActionType::Mine,
            Self::Rest => ActionType::Rest,
        }
    }
}

/// A fully formed agent intent, ready for the execution dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The action discriminant (always equal to `params.action_type()`).
    pub action_type: ActionType,
    /// Typed, validated parameters.
    pub params: ActionParams,
    /// The agent's stated reasoning (or a redirect annotation).
    pub reasoning: String,
}

impl Action {
    /// Build an action from a parameter bag and reasoning text.
    pub fn new(params: ActionParams, reasoning: impl Into<String>) -> Self {
        Self {
            action_type: params.action_type(),
            params,
            reasoning: reasoning.into(),
        }
    }

    /// The canonical do-nothing action.
    pub fn rest(reasoning: impl Into<String>) -> Self {
        Self::new(ActionParams::Rest, reasoning)
    }

    /// Rebuild this action as a redirect to a different parameter bag,
    /// prefixing the reasoning with a `[REDIRECT]` tag so logs show the
    /// original intent.
    pub fn redirect(&self, params: ActionParams, why: &str) -> Self {
        let reasoning = format!(
            "[REDIRECT from {}] {why}; originally: {}",
            self.action_type.as_str(),
            self.reasoning
        );
        Self {
            action_type: params.action_type(),
            params,
            reasoning,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn params_report_their_action_type() {
        let p = ActionParams::ClaimPlot { plot_index: Some(3) };
        assert_eq!(p.action_type(), ActionType::ClaimPlot);
        assert_eq!(ActionParams::Rest.action_type(), ActionType::Rest);
    }

    #[test]
    fn new_keeps_discriminant_in_sync() {
        let action = Action::new(
            ActionParams::DoWork { plot_id: None, plot_index: Some(0) },
            "continue the bakery",
        );
        assert_eq!(action.action_type, ActionType::DoWork);
    }

    #[test]
    fn redirect_tags_reasoning_and_swaps_type() {
        let original = Action::new(
            ActionParams::ClaimPlot { plot_index: Some(1) },
            "grab the corner plot",
        );
        let redirected = original.redirect(ActionParams::Rest, "cannot afford claim");
        assert_eq!(redirected.action_type, ActionType::Rest);
        assert!(redirected.reasoning.starts_with("[REDIRECT from claim_plot]"));
        assert!(redirected.reasoning.contains("grab the corner plot"));
    }
}
