//! Property-based test generators using proptest.
//!
//! Provides strategies for entity data and for interleavings of local and
//! remote edits.

use proptest::prelude::*;
use walletsync_entities::Tag;
use walletsync_protocol::ConflictPolicy;

/// Strategy for tag names, including ones needing trimming.
pub fn tag_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(" ?[A-Za-z][A-Za-z0-9 ]{0,15}")
        .expect("Invalid regex")
        .prop_map(|s| s.trim_end().to_string())
        .prop_filter("Tag name must not be blank", |s| !s.trim().is_empty())
}

/// Strategy for lowercase `#rrggbb` colors.
pub fn color_strategy() -> impl Strategy<Value = String> {
    any::<[u8; 3]>().prop_map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}"))
}

/// Strategy for valid, normalized tags.
pub fn tag_strategy() -> impl Strategy<Value = Tag> {
    (tag_name_strategy(), color_strategy())
        .prop_map(|(name, color)| Tag::new(name.trim(), color))
}

/// Strategy for conflict policies.
pub fn policy_strategy() -> impl Strategy<Value = ConflictPolicy> {
    prop_oneof![
        Just(ConflictPolicy::LocalWins),
        Just(ConflictPolicy::ServerWins),
        Just(ConflictPolicy::LastWriteWins),
    ]
}

/// One step of a device/server interleaving over tags.
///
/// Indices select among existing records modulo their count and are
/// ignored when there are none.
#[derive(Debug, Clone, PartialEq)]
pub enum TagStep {
    /// Create a tag on the device.
    CreateLocal(Tag),
    /// Edit a device tag.
    EditLocal(usize, Tag),
    /// Delete a device tag.
    DeleteLocal(usize),
    /// Create a tag on the server.
    CreateRemote(Tag),
    /// Edit a server tag.
    EditRemote(usize, Tag),
    /// Delete a server tag.
    DeleteRemote(usize),
    /// Run a full sync, optionally while offline.
    Sync {
        /// Whether the device is offline during this sync.
        offline: bool,
    },
}

/// Strategy for a single interleaving step.
pub fn tag_step_strategy() -> impl Strategy<Value = TagStep> {
    prop_oneof![
        3 => tag_strategy().prop_map(TagStep::CreateLocal),
        2 => (any::<usize>(), tag_strategy()).prop_map(|(i, t)| TagStep::EditLocal(i, t)),
        1 => any::<usize>().prop_map(TagStep::DeleteLocal),
        2 => tag_strategy().prop_map(TagStep::CreateRemote),
        2 => (any::<usize>(), tag_strategy()).prop_map(|(i, t)| TagStep::EditRemote(i, t)),
        1 => any::<usize>().prop_map(TagStep::DeleteRemote),
        2 => any::<bool>().prop_map(|offline| TagStep::Sync { offline }),
    ]
}

/// Strategy for a sequence of interleaving steps.
pub fn tag_steps_strategy(min_steps: usize, max_steps: usize) -> impl Strategy<Value = Vec<TagStep>> {
    prop::collection::vec(tag_step_strategy(), min_steps..max_steps)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn colors_are_valid(color in color_strategy()) {
            prop_assert_eq!(color.len(), 7);
            prop_assert!(color.starts_with('#'));
            prop_assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        #[test]
        fn tags_are_normalized(tag in tag_strategy()) {
            prop_assert!(!tag.name.is_empty());
            prop_assert_eq!(tag.name.trim(), tag.name.as_str());
        }
    }
}
