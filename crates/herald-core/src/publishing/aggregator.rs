//! Derives a post's overall status from its destinations.

use crate::domain::{DestinationStatus, PostStatus};

/// Compute the post status once its destinations settle.
///
/// Returns `None` while any destination is still pending (or there are no
/// destinations), meaning the post keeps its current status. A post with at
/// least one successful destination counts as published even if others
/// failed; the failures stay visible on the destination records.
pub fn aggregate_post_status(statuses: &[DestinationStatus]) -> Option<PostStatus> {
    if statuses.is_empty() || statuses.contains(&DestinationStatus::Pending) {
        return None;
    }

    if statuses.contains(&DestinationStatus::Success) {
        Some(PostStatus::Published)
    } else {
        Some(PostStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DestinationStatus::*;

    #[test]
    fn test_all_success_is_published() {
        assert_eq!(aggregate_post_status(&[Success, Success]), Some(PostStatus::Published));
    }

    #[test]
    fn test_partial_success_is_published() {
        assert_eq!(aggregate_post_status(&[Success, Failed]), Some(PostStatus::Published));
    }

    #[test]
    fn test_all_failed_is_failed() {
        assert_eq!(aggregate_post_status(&[Failed, Failed]), Some(PostStatus::Failed));
    }

    #[test]
    fn test_pending_leaves_post_unchanged() {
        assert_eq!(aggregate_post_status(&[Success, Pending]), None);
        assert_eq!(aggregate_post_status(&[Failed, Pending]), None);
        assert_eq!(aggregate_post_status(&[]), None);
    }

    #[test]
    fn test_recomputation_is_stable() {
        let statuses = [Failed, Success, Failed];
        assert_eq!(aggregate_post_status(&statuses), aggregate_post_status(&statuses));
    }
}
