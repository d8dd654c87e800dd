//! Leaderboard ranking over the Horde user list.
//!
//! Ranking is a stable sort on the selected key, so users with equal
//! scores keep the relative order the server returned them in.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of users shown above the fold.
pub const LEADERBOARD_SIZE: usize = 10;

/// The per-user figures the leaderboard ranks on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStanding {
    pub id: i64,
    pub username: String,
    pub kudos: f64,
    pub megapixelsteps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKey {
    #[default]
    Kudos,
    MegapixelSteps,
}

impl LeaderboardKey {
    fn score(self, user: &UserStanding) -> f64 {
        match self {
            Self::Kudos => user.kudos,
            Self::MegapixelSteps => user.megapixelsteps,
        }
    }
}

impl FromStr for LeaderboardKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kudos" => Ok(Self::Kudos),
            "megapixelsteps" | "mps" => Ok(Self::MegapixelSteps),
            other => Err(CoreError::Validation(format!(
                "Invalid leaderboard key '{other}'. Must be one of: kudos, megapixelsteps"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Descending,
    Ascending,
}

/// A user with their 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedUser {
    pub rank: usize,
    pub user: UserStanding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leaderboard {
    pub top: Vec<RankedUser>,
    /// The current user's own standing when it falls outside `top`.
    pub own: Option<RankedUser>,
}

/// Rank `users` by `key`. The input order is the tie-breaker.
pub fn rank_users(
    users: &[UserStanding],
    key: LeaderboardKey,
    direction: SortDirection,
) -> Vec<UserStanding> {
    let mut sorted = users.to_vec();
    match direction {
        SortDirection::Descending => {
            sorted.sort_by(|a, b| key.score(b).total_cmp(&key.score(a)));
        }
        SortDirection::Ascending => {
            sorted.sort_by(|a, b| key.score(a).total_cmp(&key.score(b)));
        }
    }
    sorted
}

/// Build the top-N leaderboard plus the current user's rank if it is
/// not already shown.
pub fn build_leaderboard(
    users: &[UserStanding],
    key: LeaderboardKey,
    direction: SortDirection,
    current_user_id: Option<i64>,
) -> Leaderboard {
    let ranked: Vec<RankedUser> = rank_users(users, key, direction)
        .into_iter()
        .enumerate()
        .map(|(idx, user)| RankedUser {
            rank: idx + 1,
            user,
        })
        .collect();

    let own = current_user_id.and_then(|id| {
        ranked
            .iter()
            .skip(LEADERBOARD_SIZE)
            .find(|r| r.user.id == id)
            .cloned()
    });

    Leaderboard {
        top: ranked.into_iter().take(LEADERBOARD_SIZE).collect(),
        own,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str, kudos: f64) -> UserStanding {
        UserStanding {
            id,
            username: name.into(),
            kudos,
            megapixelsteps: 0.0,
        }
    }

    fn names(users: &[UserStanding]) -> Vec<&str> {
        users.iter().map(|u| u.username.as_str()).collect()
    }

    #[test]
    fn descending_by_kudos() {
        let users = vec![user(2, "B", 50.0), user(1, "A", 100.0)];
        let ranked = rank_users(&users, LeaderboardKey::Kudos, SortDirection::Descending);
        assert_eq!(names(&ranked), vec!["A", "B"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let users = vec![
            user(1, "first", 10.0),
            user(2, "second", 10.0),
            user(3, "top", 99.0),
            user(4, "third", 10.0),
        ];
        let ranked = rank_users(&users, LeaderboardKey::Kudos, SortDirection::Descending);
        assert_eq!(names(&ranked), vec!["top", "first", "second", "third"]);

        let ranked = rank_users(&users, LeaderboardKey::Kudos, SortDirection::Ascending);
        assert_eq!(names(&ranked), vec!["first", "second", "third", "top"]);
    }

    #[test]
    fn ranks_by_megapixelsteps() {
        let mut a = user(1, "A", 1.0);
        a.megapixelsteps = 5.0;
        let mut b = user(2, "B", 100.0);
        b.megapixelsteps = 1.0;
        let ranked = rank_users(&[b, a], LeaderboardKey::MegapixelSteps, SortDirection::Descending);
        assert_eq!(names(&ranked), vec!["A", "B"]);
    }

    #[test]
    fn own_rank_added_when_outside_top() {
        let users: Vec<_> = (0..15)
            .map(|n| user(n, &format!("u{n}"), 100.0 - n as f64))
            .collect();

        let board = build_leaderboard(&users, LeaderboardKey::Kudos, SortDirection::Descending, Some(12));
        assert_eq!(board.top.len(), LEADERBOARD_SIZE);
        assert_eq!(board.top[0].rank, 1);
        let own = board.own.expect("own rank should be present");
        assert_eq!(own.rank, 13);
        assert_eq!(own.user.id, 12);
    }

    #[test]
    fn own_rank_omitted_when_inside_top() {
        let users: Vec<_> = (0..15)
            .map(|n| user(n, &format!("u{n}"), 100.0 - n as f64))
            .collect();
        let board = build_leaderboard(&users, LeaderboardKey::Kudos, SortDirection::Descending, Some(3));
        assert!(board.own.is_none());
    }

    #[test]
    fn key_parses() {
        assert_eq!("kudos".parse::<LeaderboardKey>().unwrap(), LeaderboardKey::Kudos);
        assert_eq!("mps".parse::<LeaderboardKey>().unwrap(), LeaderboardKey::MegapixelSteps);
        assert!("fame".parse::<LeaderboardKey>().is_err());
    }
}
