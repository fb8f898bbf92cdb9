//! Donation lifecycle rules.
//!
//! ```text
//! available --claim (ngo)--> claimed --en route--> on_the_way
//!     |                         |                      |
//!     |                         +------collected-------+--> picked_up --delivered--> completed
//!     +--cancel (owning donor)--> cancelled
//! ```

use bson::oid::ObjectId;
use foodshare_db::models::{Donation, DonationStatus, NotificationType, Role, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationAction {
    Claim,
    Cancel,
    MarkEnRoute,
    MarkCollected,
    MarkDelivered,
}

impl DonationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Cancel => "cancel",
            Self::MarkEnRoute => "mark en route",
            Self::MarkCollected => "mark collected",
            Self::MarkDelivered => "mark delivered",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("only {required} accounts can {action}")]
    WrongRole {
        action: &'static str,
        required: &'static str,
    },
    #[error("only the donor who listed this donation can cancel it")]
    NotOwner,
    #[error("only the NGO that claimed this donation can update it")]
    NotClaimer,
    #[error("you have already claimed this donation")]
    AlreadyClaimer,
    #[error("cannot {action} a donation that is {from}")]
    InvalidTransition {
        from: DonationStatus,
        action: &'static str,
    },
}

/// Who is acting on a donation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ObjectId,
    pub role: Role,
    pub name: String,
}

impl Actor {
    /// Builds an actor from a loaded profile. NGOs act under their
    /// organization name when they have one.
    pub fn from_user(user: &User) -> Option<Self> {
        let name = user
            .organization
            .as_ref()
            .map(|org| org.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| user.display_name.clone());
        Some(Self {
            id: user.id?,
            role: user.role,
            name,
        })
    }
}

/// Validates `action` against the donation's current state and the actor,
/// returning the status the donation moves to.
pub fn plan_transition(
    donation: &Donation,
    actor: &Actor,
    action: DonationAction,
) -> Result<DonationStatus, WorkflowError> {
    use DonationStatus::*;

    let invalid = || WorkflowError::InvalidTransition {
        from: donation.status,
        action: action.as_str(),
    };

    match action {
        DonationAction::Claim => {
            require_role(actor, Role::Ngo, action)?;
            if donation.claimed_by == Some(actor.id) {
                return Err(WorkflowError::AlreadyClaimer);
            }
            if donation.status != Available {
                return Err(invalid());
            }
            Ok(Claimed)
        }
        DonationAction::Cancel => {
            require_role(actor, Role::Donor, action)?;
            if donation.donor_id != actor.id {
                return Err(WorkflowError::NotOwner);
            }
            if donation.status != Available {
                return Err(invalid());
            }
            Ok(Cancelled)
        }
        DonationAction::MarkEnRoute => {
            require_claimer(donation, actor, action)?;
            match donation.status {
                Claimed => Ok(OnTheWay),
                _ => Err(invalid()),
            }
        }
        DonationAction::MarkCollected => {
            require_claimer(donation, actor, action)?;
            match donation.status {
                Claimed | OnTheWay => Ok(PickedUp),
                _ => Err(invalid()),
            }
        }
        DonationAction::MarkDelivered => {
            require_claimer(donation, actor, action)?;
            match donation.status {
                PickedUp => Ok(Completed),
                _ => Err(invalid()),
            }
        }
    }
}

fn require_role(actor: &Actor, role: Role, action: DonationAction) -> Result<(), WorkflowError> {
    if actor.role != role {
        return Err(WorkflowError::WrongRole {
            action: action.as_str(),
            required: match role {
                Role::Donor => "donor",
                Role::Ngo => "NGO",
            },
        });
    }
    Ok(())
}

fn require_claimer(
    donation: &Donation,
    actor: &Actor,
    action: DonationAction,
) -> Result<(), WorkflowError> {
    require_role(actor, Role::Ngo, action)?;
    if donation.claimed_by != Some(actor.id) {
        return Err(WorkflowError::NotClaimer);
    }
    Ok(())
}

/// Notification sent to the donor after a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorNotice {
    pub title: &'static str,
    pub message: String,
    pub notification_type: NotificationType,
}

pub fn donor_notice(status: DonationStatus, food_name: &str, actor_name: &str) -> Option<DonorNotice> {
    let (title, message, notification_type) = match status {
        DonationStatus::Claimed => (
            "Donation Claimed",
            format!("{actor_name} has claimed your donation \"{food_name}\"."),
            NotificationType::DonationClaimed,
        ),
        DonationStatus::OnTheWay => (
            "NGO On The Way",
            format!("{actor_name} is on the way to pick up \"{food_name}\"."),
            NotificationType::StatusUpdate,
        ),
        DonationStatus::PickedUp => (
            "Donation Picked Up",
            format!("{actor_name} has picked up \"{food_name}\"."),
            NotificationType::StatusUpdate,
        ),
        DonationStatus::Completed => (
            "Donation Completed",
            format!("\"{food_name}\" was delivered by {actor_name}. Thank you for donating!"),
            NotificationType::StatusUpdate,
        ),
        DonationStatus::Cancelled => (
            "Donation Cancelled",
            format!("\"{food_name}\" has been cancelled."),
            NotificationType::StatusUpdate,
        ),
        DonationStatus::Available => return None,
    };
    Some(DonorNotice {
        title,
        message,
        notification_type,
    })
}
