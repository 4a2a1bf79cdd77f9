use serde::{Deserialize, Serialize};

/// A structured shopping intent proposed by the conversational agent.
///
/// Produced transiently by the intent extractor and never persisted. The wire
/// shape is `{action, itemName?, quantity?}` - the same contract whether the
/// intent came from an LLM completion or a native tool call. `item_name` is
/// free text and must be resolved against the catalog before it can touch
/// the cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Intent {
    Add {
        #[serde(rename = "itemName")]
        item_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quantity: Option<u32>,
    },
    Remove {
        #[serde(rename = "itemName")]
        item_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quantity: Option<u32>,
    },
    Clear,
    Checkout,
}

impl Intent {
    pub fn is_checkout(&self) -> bool {
        matches!(self, Self::Checkout)
    }

    /// Checkout is exclusive and dominant: if any intent in a batch is a
    /// checkout, the whole batch collapses to a singleton `[checkout]` and
    /// concurrent add/remove intents are discarded.
    pub fn collapse_checkout(intents: Vec<Intent>) -> Vec<Intent> {
        if intents.iter().any(Intent::is_checkout) {
            vec![Intent::Checkout]
        } else {
            intents
        }
    }
}
