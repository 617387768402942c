use clap::{Args, Subcommand};
use roundtrack_core::storage::Database;
use roundtrack_core::{Config, NewUser, Role, SystemClock, UserAdmin, UserUpdate};

use super::{open_outbox, print_json, CliResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    Add {
        name: String,
        #[command(flatten)]
        fields: UserFields,
    },
    /// List users
    List {
        /// Include deactivated users
        #[arg(long)]
        all: bool,
    },
    /// Edit a user
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: UserFields,
    },
    /// Deactivate a user; their blocks are kept
    Deactivate { id: i64 },
}

#[derive(Args)]
pub struct UserFields {
    #[arg(long)]
    avatar: Option<String>,
    /// Color as #rrggbb
    #[arg(long)]
    color: Option<String>,
    /// Items per day
    #[arg(long)]
    goal: Option<u32>,
    /// user or admin
    #[arg(long)]
    role: Option<Role>,
}

pub fn run(action: UserAction) -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let outbox = open_outbox(&config);
    let clock = SystemClock;
    let admin = UserAdmin::new(&db, &outbox, &clock);

    match action {
        UserAction::Add { name, fields } => {
            let mut new = NewUser::named(name);
            if let Some(avatar) = fields.avatar {
                new.avatar = avatar;
            }
            if let Some(color) = fields.color {
                new.color = color;
            }
            if let Some(goal) = fields.goal {
                new.daily_goal = goal;
            }
            if let Some(role) = fields.role {
                new.role = role;
            }
            print_json(&admin.create(new)?)?;
        }
        UserAction::List { all } => {
            print_json(&admin.list(all)?)?;
        }
        UserAction::Edit { id, name, fields } => {
            let update = UserUpdate {
                name,
                avatar: fields.avatar,
                color: fields.color,
                daily_goal: fields.goal,
                role: fields.role,
            };
            if update.is_empty() {
                return Err("nothing to change".into());
            }
            print_json(&admin.update(id, update)?)?;
        }
        UserAction::Deactivate { id } => {
            let user = admin.deactivate(id)?;
            println!("user {} ({}) deactivated", user.id, user.name);
        }
    }
    Ok(())
}
