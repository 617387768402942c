//! Workers and administrators.
//!
//! Users are never hard-deleted: blocks keep pointing at them, so
//! removal is a soft deactivation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidValue {
                field: "role".into(),
                message: format!("unknown role '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    pub color: String,
    /// Items to complete per day; feeds the daily goal achievement.
    pub daily_goal: u32,
    pub role: Role,
    pub active: bool,
}

/// Fields for a user that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
    #[serde(default)]
    pub role: Role,
}

fn default_color() -> String {
    "#64748b".to_string()
}

fn default_daily_goal() -> u32 {
    100
}

impl NewUser {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: String::new(),
            color: default_color(),
            daily_goal: default_daily_goal(),
            role: Role::User,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_color(&self.color)
    }
}

/// Partial edit. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub daily_goal: Option<u32>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the edit to `user`, validating before anything changes.
    pub fn apply(self, user: &mut User) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if let Some(color) = self.color {
            user.color = color;
        }
        if let Some(goal) = self.daily_goal {
            user.daily_goal = goal;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "must not be empty".into(),
        });
    }
    Ok(())
}

/// `#rrggbb`.
fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: "color".into(),
            message: format!("'{color}' is not a #rrggbb color"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            name: "Ana".into(),
            avatar: String::new(),
            color: "#112233".into(),
            daily_goal: 50,
            role: Role::User,
            active: true,
        }
    }

    #[test]
    fn new_user_requires_name_and_hex_color() {
        assert!(NewUser::named("Luis").validate().is_ok());
        assert!(NewUser::named("   ").validate().is_err());

        let mut bad = NewUser::named("Luis");
        bad.color = "blue".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn invalid_update_leaves_user_untouched() {
        let mut u = user();
        let update = UserUpdate {
            daily_goal: Some(80),
            color: Some("#zzzzzz".into()),
            ..UserUpdate::default()
        };
        assert!(update.apply(&mut u).is_err());
        assert_eq!(u, user());
    }

    #[test]
    fn update_applies_only_given_fields() {
        let mut u = user();
        UserUpdate {
            name: Some("  Ana María ".into()),
            role: Some(Role::Admin),
            ..UserUpdate::default()
        }
        .apply(&mut u)
        .unwrap();
        assert_eq!(u.name, "Ana María");
        assert_eq!(u.role, Role::Admin);
        assert_eq!(u.daily_goal, 50);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }
}
