use schreibstube_common::model::{Id, user::UserMarker};
use schreibstube_db::{Repository, Result};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Users cannot follow themselves; nothing was stored.
    SelfFollowRejected,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

/// Directed "follower reads author" edges between users.
#[derive(Copy, Clone, Debug)]
pub struct FollowGraph<'a> {
    repository: &'a dyn Repository,
}

impl<'a> FollowGraph<'a> {
    #[must_use]
    pub fn new(repository: &'a dyn Repository) -> Self {
        Self { repository }
    }

    pub async fn is_following(
        &self,
        follower: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<bool> {
        if follower == target {
            return Ok(false);
        }
        self.repository.follow_exists(follower, target).await
    }

    pub async fn follow(
        &self,
        follower: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<FollowOutcome> {
        if follower == target {
            return Ok(FollowOutcome::SelfFollowRejected);
        }

        let created = self.repository.insert_follow(follower, target).await?;
        Ok(if created {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        })
    }

    pub async fn unfollow(
        &self,
        follower: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<UnfollowOutcome> {
        let removed = self.repository.delete_follow(follower, target).await?;
        Ok(if removed {
            UnfollowOutcome::Removed
        } else {
            UnfollowOutcome::NotFollowing
        })
    }
}
