//! Booking and settlement engine.
//!
//! The engine owns all wallet, booking, request, and ledger state and
//! applies every operation as a single synchronous step. Callers hold it
//! behind a lock; each operation either commits fully or leaves the state
//! untouched.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collab::{CredentialVerifier, ProviderDirectory};
use crate::discount;
use crate::ledger::{Ledger, Page, Receipt};
use crate::model::{
    Actor, Booking, BookingId, BookingStatus, MoneyRequest, RequestId, RequestStatus,
    TransactionRecord, TxnId, TxnStatus, UserId,
};
use crate::Amount;

mod wallet;
pub use wallet::{pin_is_well_formed, PinHash, WalletAccount};

mod error;
pub use error::{
    BookingError, EngineError, ErrorCode, LedgerError, RequestError, SettlementError, WalletError,
};

/// Parameters of a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_provider_id: UserId,
    pub title: String,
    pub description: String,
    pub booking_date: chrono::DateTime<Utc>,
    pub charge: Amount,
}

/// Parameters of a settlement call.
#[derive(Debug, Clone)]
pub struct SettleArgs {
    pub receiver: UserId,
    pub pin: String,
    /// Base amount before discount. Ignored when `request_id` is given
    /// (the request is authoritative); defaults to the booking charge when
    /// only `booking_id` is given.
    pub amount: Option<Amount>,
    pub booking_id: Option<BookingId>,
    pub request_id: Option<RequestId>,
    /// Same key on a retry returns the original transaction.
    pub idempotency_key: Option<String>,
}

/// The booking and settlement engine.
pub struct Engine {
    wallets: HashMap<UserId, WalletAccount>,
    bookings: HashMap<BookingId, Booking>,
    requests: HashMap<RequestId, MoneyRequest>,
    /// Open request per booking; enforces at most one pending request.
    pending_requests: HashMap<BookingId, RequestId>,
    ledger: Ledger,
    /// Idempotency keys of committed settlements.
    settled_keys: HashMap<String, TxnId>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self {
            wallets: HashMap::new(),
            bookings: HashMap::new(),
            requests: HashMap::new(),
            pending_requests: HashMap::new(),
            ledger: Ledger::new(),
            settled_keys: HashMap::new(),
        }
    }

    // --- wallet ---

    /// Register a wallet for `owner` with a 4-digit PIN and zero balance.
    pub fn register_wallet(
        &mut self,
        owner: UserId,
        pin: &str,
    ) -> Result<&WalletAccount, WalletError> {
        if !pin_is_well_formed(pin) {
            return Err(WalletError::MalformedPin);
        }
        if self.wallets.contains_key(&owner) {
            return Err(WalletError::AlreadyExists(owner));
        }

        let wallet = self
            .wallets
            .entry(owner)
            .or_insert_with(|| WalletAccount::new(owner, pin));
        info!(owner = %owner, "wallet registered");
        Ok(wallet)
    }

    pub fn wallet(&self, owner: UserId) -> Result<&WalletAccount, WalletError> {
        self.wallets.get(&owner).ok_or(WalletError::NotFound(owner))
    }

    /// Constant-time PIN check.
    pub fn verify_pin(&self, owner: UserId, pin: &str) -> Result<(), WalletError> {
        let wallet = self.wallet(owner)?;
        if wallet.pin_matches(pin) {
            Ok(())
        } else {
            Err(WalletError::InvalidPin)
        }
    }

    /// Replace the PIN after re-authenticating against the primary account.
    pub fn reset_pin(
        &mut self,
        owner: UserId,
        main_password: &str,
        new_pin: &str,
        credentials: &dyn CredentialVerifier,
    ) -> Result<(), WalletError> {
        if !pin_is_well_formed(new_pin) {
            return Err(WalletError::MalformedPin);
        }
        let wallet = self
            .wallets
            .get_mut(&owner)
            .ok_or(WalletError::NotFound(owner))?;
        if !credentials.verify(owner, main_password) {
            return Err(WalletError::Unauthorized);
        }

        wallet.set_pin(new_pin);
        info!(owner = %owner, "wallet pin reset");
        Ok(())
    }

    pub fn set_discount(
        &mut self,
        owner: UserId,
        percent: u8,
    ) -> Result<&WalletAccount, WalletError> {
        if percent > 100 {
            return Err(WalletError::DiscountOutOfRange(percent));
        }
        let wallet = self
            .wallets
            .get_mut(&owner)
            .ok_or(WalletError::NotFound(owner))?;

        wallet.set_discount(percent);
        info!(owner = %owner, percent = percent, "wallet discount updated");
        Ok(wallet)
    }

    /// Top up the wallet. Deposits are balance mutations only; they do not
    /// appear in the transfer ledger.
    pub fn deposit(&mut self, owner: UserId, amount: Amount) -> Result<&WalletAccount, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        let wallet = self
            .wallets
            .get_mut(&owner)
            .ok_or(WalletError::NotFound(owner))?;

        wallet.credit(amount);
        info!(owner = %owner, amount = %amount, "wallet deposit applied");
        Ok(wallet)
    }

    // --- bookings ---

    pub fn create_booking(
        &mut self,
        user: UserId,
        new: NewBooking,
    ) -> Result<&Booking, BookingError> {
        if new.charge.is_negative() {
            return Err(BookingError::NegativeCharge(new.charge));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: user,
            service_provider_id: new.service_provider_id,
            title: new.title,
            description: new.description,
            booking_date: new.booking_date,
            charge: new.charge,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        let id = booking.id;
        info!(booking = %id, user = %user, provider = %booking.service_provider_id, "booking created");
        Ok(self.bookings.entry(id).or_insert(booking))
    }

    /// Fetch a booking; parties only, anyone else sees `NotFound`.
    pub fn booking(&self, caller: UserId, id: BookingId) -> Result<&Booking, BookingError> {
        self.bookings
            .get(&id)
            .filter(|b| b.actor_for(caller).is_some())
            .ok_or(BookingError::NotFound(id))
    }

    /// Caller-driven status update. `requested` and `paid` are reachable
    /// only through request creation and settlement, never through here.
    pub fn update_booking_status(
        &mut self,
        caller: UserId,
        id: BookingId,
        to: BookingStatus,
    ) -> Result<&Booking, BookingError> {
        let booking = self.bookings.get(&id).ok_or(BookingError::NotFound(id))?;
        let actor = booking
            .actor_for(caller)
            .ok_or(BookingError::NotFound(id))?;
        if matches!(to, BookingStatus::Requested | BookingStatus::Paid) {
            return Err(BookingError::InvalidTransition {
                id,
                from: booking.status,
                to,
            });
        }
        self.transition(id, to, actor)
    }

    // --- money requests ---

    /// Open a payment request against a completed booking and move the
    /// booking to `requested`.
    pub fn create_request(
        &mut self,
        provider: UserId,
        booking_id: BookingId,
        amount: Amount,
        description: String,
    ) -> Result<&MoneyRequest, RequestError> {
        let booking = self
            .bookings
            .get(&booking_id)
            .filter(|b| b.service_provider_id == provider)
            .ok_or(RequestError::BookingNotFound(booking_id))?;
        // Dedup before the status check so a racing second caller is told
        // about the existing request, not about the state it caused
        if self.pending_requests.contains_key(&booking_id) {
            return Err(RequestError::DuplicateRequest(booking_id));
        }
        if booking.status != BookingStatus::Completed {
            return Err(RequestError::NotCompleted {
                id: booking_id,
                status: booking.status,
            });
        }
        if !amount.is_positive() {
            return Err(RequestError::NonPositiveAmount(amount));
        }

        let request = MoneyRequest {
            id: Uuid::new_v4(),
            booking_id,
            service_provider_id: provider,
            user_id: booking.user_id,
            amount,
            description,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        let id = request.id;
        self.pending_requests.insert(booking_id, id);
        self.requests.insert(id, request);

        // Checked completed above, so this cannot be rejected
        self.transition(booking_id, BookingStatus::Requested, Actor::Provider)
            .expect("completed booking moves to requested");

        info!(request = %id, booking = %booking_id, amount = %amount, "money request created");
        Ok(&self.requests[&id])
    }

    /// Requests where `user` is payer or provider, newest first.
    pub fn requests_for(&self, user: UserId) -> Vec<&MoneyRequest> {
        let mut out: Vec<&MoneyRequest> = self
            .requests
            .values()
            .filter(|r| r.user_id == user || r.service_provider_id == user)
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    // --- settlement ---

    /// Wallet-to-wallet transfer with discount application.
    ///
    /// All checks run before any mutation; once the balances move, the
    /// ledger entry, request state, and idempotency key are written in the
    /// same step. The booking transition afterwards is best-effort: money
    /// movement is the durable side effect.
    pub fn settle(
        &mut self,
        payer: UserId,
        args: SettleArgs,
    ) -> Result<&TransactionRecord, SettlementError> {
        if let Some(key) = &args.idempotency_key {
            if let Some(&txn) = self.settled_keys.get(key) {
                info!(txn = %txn, key = %key, "settlement replayed from idempotency key");
                return Ok(self
                    .ledger
                    .get(txn)
                    .expect("idempotency key maps to a ledger entry"));
            }
        }

        let payer_wallet = self
            .wallets
            .get(&payer)
            .ok_or(SettlementError::WalletNotFound(payer))?;
        if !payer_wallet.pin_matches(&args.pin) {
            return Err(SettlementError::InvalidPin);
        }
        let available = payer_wallet.balance();

        // A referenced request is authoritative for receiver, amount, and
        // booking. A request not addressed to this payer/receiver pair is
        // reported as missing rather than described.
        let (receiver, base, booking_id, request_id) = match args.request_id {
            Some(rid) => {
                let request = self
                    .requests
                    .get(&rid)
                    .filter(|r| r.user_id == payer && r.service_provider_id == args.receiver)
                    .ok_or(SettlementError::RequestNotFound(rid))?;
                if request.status != RequestStatus::Pending {
                    return Err(SettlementError::AlreadyPaid(rid));
                }
                (
                    request.service_provider_id,
                    request.amount,
                    Some(request.booking_id),
                    Some(rid),
                )
            }
            None => {
                let base = match (args.amount, args.booking_id) {
                    (Some(amount), _) => amount,
                    (None, Some(bid)) => {
                        self.bookings
                            .get(&bid)
                            .ok_or(SettlementError::BookingNotFound(bid))?
                            .charge
                    }
                    (None, None) => return Err(SettlementError::NonPositiveAmount(Amount::ZERO)),
                };
                (args.receiver, base, args.booking_id, None)
            }
        };

        if receiver == payer {
            return Err(SettlementError::SelfTransfer);
        }
        if !base.is_positive() {
            return Err(SettlementError::NonPositiveAmount(base));
        }

        let receiver_wallet = self
            .wallets
            .get(&receiver)
            .ok_or(SettlementError::WalletNotFound(receiver))?;
        let discount_percent = receiver_wallet.discount_percent();
        let final_amount = discount::final_amount(base, discount_percent);

        if available < final_amount {
            return Err(SettlementError::InsufficientBalance {
                available,
                required: final_amount,
            });
        }

        // The booking must exist and name both parties before money moves
        if let Some(bid) = booking_id {
            self.bookings
                .get(&bid)
                .filter(|b| b.user_id == payer && b.service_provider_id == receiver)
                .ok_or(SettlementError::BookingNotFound(bid))?;
        }

        // Commit. Balance updates, ledger entry, request state, and the
        // idempotency key land under this one exclusive borrow.
        self.wallets
            .get_mut(&payer)
            .expect("payer wallet checked above")
            .debit(final_amount);
        self.wallets
            .get_mut(&receiver)
            .expect("receiver wallet checked above")
            .credit(final_amount);

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            sender_id: payer,
            receiver_id: receiver,
            base_amount: base,
            discount_applied: discount_percent,
            final_amount,
            booking_id,
            request_id,
            status: TxnStatus::Completed,
            created_at: Utc::now(),
        };
        let txn_id = record.id;
        self.ledger.append(record);
        if let Some(key) = args.idempotency_key {
            self.settled_keys.insert(key, txn_id);
        }

        if let Some(rid) = request_id {
            let request = self.requests.get_mut(&rid).expect("request checked above");
            request.status = RequestStatus::Paid;
            self.pending_requests.remove(&request.booking_id);
        }

        if let Some(bid) = booking_id {
            if let Err(e) = self.transition(bid, BookingStatus::Paid, Actor::System) {
                warn!(
                    booking = %bid,
                    txn = %txn_id,
                    reason = %e,
                    "settlement committed but booking not marked paid"
                );
            }
        }

        info!(
            txn = %txn_id,
            payer = %payer,
            receiver = %receiver,
            base = %base,
            discount = discount_percent,
            amount = %final_amount,
            "settlement applied"
        );
        Ok(self.ledger.get(txn_id).expect("record just appended"))
    }

    // --- ledger ---

    pub fn history(&self, user: UserId, page: usize, page_size: usize) -> Page {
        self.ledger.for_user(user, page, page_size)
    }

    /// Receipt for a transaction the caller is a party to.
    pub fn receipt(
        &self,
        caller: UserId,
        id: TxnId,
        directory: &dyn ProviderDirectory,
    ) -> Result<Receipt, LedgerError> {
        let record = self
            .ledger
            .get(id)
            .filter(|r| r.involves(caller))
            .ok_or(LedgerError::NotFound(id))?;
        Ok(Receipt::resolve(record, directory))
    }

    pub fn statement_csv(&self, user: UserId) -> String {
        self.ledger.statement_csv(user)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// Private API
impl Engine {
    /// The only place a booking status changes.
    fn transition(
        &mut self,
        id: BookingId,
        to: BookingStatus,
        actor: Actor,
    ) -> Result<&Booking, BookingError> {
        let booking = self.bookings.get_mut(&id).ok_or(BookingError::NotFound(id))?;
        let from = booking.status;
        if !from.can_transition(to, actor) {
            return Err(BookingError::InvalidTransition { id, from, to });
        }

        booking.status = to;
        info!(booking = %id, from = %from, to = %to, "booking status updated");
        Ok(booking)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
