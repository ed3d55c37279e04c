//! Core domain types for the booking and settlement engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

/// Platform user identifier (customers and providers share the id space).
pub type UserId = Uuid;

/// Booking identifier.
pub type BookingId = Uuid;

/// Money request identifier.
pub type RequestId = Uuid;

/// Ledger transaction identifier.
pub type TxnId = Uuid;

/// Who is attempting an operation on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The customer who created the booking.
    User,
    /// The provider assigned to the booking.
    Provider,
    /// Internal transitions driven by settlement.
    System,
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created by the user, awaiting the provider's decision.
    Pending,
    /// Accepted by the provider.
    Confirmed,
    /// Work done; the provider may now request payment.
    Completed,
    /// A money request is open against this booking.
    Requested,
    /// Settled through the wallet.
    Paid,
    // Cancelled is a final state
    Cancelled,
}

impl BookingStatus {
    /// Whether `actor` may move a booking from `self` to `to`.
    ///
    /// This is the whole transition table; anything not matched here is
    /// rejected and the booking is left unchanged.
    pub fn can_transition(self, to: BookingStatus, actor: Actor) -> bool {
        use Actor::*;
        use BookingStatus::*;
        matches!(
            (self, to, actor),
            (Pending, Confirmed, Provider)
                | (Pending, Cancelled, User | Provider)
                | (Confirmed, Completed, Provider)
                | (Confirmed, Cancelled, Provider)
                | (Completed, Requested, Provider)
                | (Completed | Requested, Paid, System)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Requested => "requested",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A service engagement between a user and a provider.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub service_provider_id: UserId,
    pub title: String,
    pub description: String,
    pub booking_date: DateTime<Utc>,
    pub charge: Amount,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Role of `caller` on this booking, if any.
    pub fn actor_for(&self, caller: UserId) -> Option<Actor> {
        if caller == self.user_id {
            Some(Actor::User)
        } else if caller == self.service_provider_id {
            Some(Actor::Provider)
        } else {
            None
        }
    }
}

/// State of a provider's payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Paid,
}

/// A provider's request for payment against a completed booking.
#[derive(Debug, Clone, Serialize)]
pub struct MoneyRequest {
    pub id: RequestId,
    pub booking_id: BookingId,
    pub service_provider_id: UserId,
    pub user_id: UserId,
    pub amount: Amount,
    pub description: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome recorded on a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    Completed,
    /// Reserved for manual reconciliation of interrupted settlements.
    Failed,
}

/// Immutable record of a wallet-to-wallet transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: TxnId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub base_amount: Amount,
    pub discount_applied: u8,
    pub final_amount: Amount,
    pub booking_id: Option<BookingId>,
    pub request_id: Option<RequestId>,
    pub status: TxnStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether `user` is a party to this transfer.
    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.receiver_id == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Actor::*;
    use BookingStatus::*;

    #[test]
    fn provider_confirms_pending() {
        assert!(Pending.can_transition(Confirmed, Provider));
        assert!(!Pending.can_transition(Confirmed, User));
    }

    #[test]
    fn either_party_cancels_pending() {
        assert!(Pending.can_transition(Cancelled, User));
        assert!(Pending.can_transition(Cancelled, Provider));
        assert!(!Pending.can_transition(Cancelled, System));
    }

    #[test]
    fn only_provider_completes_or_cancels_confirmed() {
        assert!(Confirmed.can_transition(Completed, Provider));
        assert!(Confirmed.can_transition(Cancelled, Provider));
        assert!(!Confirmed.can_transition(Completed, User));
        assert!(!Confirmed.can_transition(Cancelled, User));
    }

    #[test]
    fn paid_is_system_only() {
        assert!(Completed.can_transition(Paid, System));
        assert!(Requested.can_transition(Paid, System));
        assert!(!Completed.can_transition(Paid, User));
        assert!(!Requested.can_transition(Paid, Provider));
    }

    #[test]
    fn no_state_skipping() {
        assert!(!Pending.can_transition(Completed, Provider));
        assert!(!Pending.can_transition(Paid, System));
        assert!(!Confirmed.can_transition(Requested, Provider));
        assert!(!Confirmed.can_transition(Paid, System));
    }

    #[test]
    fn final_states_have_no_exits() {
        for to in [Pending, Confirmed, Completed, Requested, Paid, Cancelled] {
            for actor in [User, Provider, System] {
                assert!(!Paid.can_transition(to, actor));
                assert!(!Cancelled.can_transition(to, actor));
            }
        }
    }

    #[test]
    fn actor_for_resolves_parties() {
        let user = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: user,
            service_provider_id: provider,
            title: "Deep clean".to_string(),
            description: String::new(),
            booking_date: Utc::now(),
            charge: Amount::from_float(50.0),
            status: Pending,
            created_at: Utc::now(),
        };

        assert_eq!(booking.actor_for(user), Some(User));
        assert_eq!(booking.actor_for(provider), Some(Provider));
        assert_eq!(booking.actor_for(Uuid::new_v4()), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Requested).unwrap(), "\"requested\"");
        let parsed: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(parsed, Confirmed);
    }

    #[test]
    fn involves_matches_both_parties() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            base_amount: Amount::from_float(10.0),
            discount_applied: 0,
            final_amount: Amount::from_float(10.0),
            booking_id: None,
            request_id: None,
            status: TxnStatus::Completed,
            created_at: Utc::now(),
        };

        assert!(record.involves(sender));
        assert!(record.involves(receiver));
        assert!(!record.involves(Uuid::new_v4()));
    }
}
