//! Append-only transaction ledger.
//!
//! The ledger is the system of record for money movement. Entries are never
//! updated or removed once appended; history, receipts, and statements are
//! all read back from here.

use std::collections::HashMap;

use serde::Serialize;

use crate::collab::ProviderDirectory;
use crate::model::{TransactionRecord, TxnId, UserId};

#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<TransactionRecord>,
    index: HashMap<TxnId, usize>,
}

/// One page of a user's history, newest first.
#[derive(Debug, Serialize)]
pub struct Page {
    pub items: Vec<TransactionRecord>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TransactionRecord) -> &TransactionRecord {
        let pos = self.entries.len();
        self.index.insert(record.id, pos);
        self.entries.push(record);
        &self.entries[pos]
    }

    pub fn get(&self, id: TxnId) -> Option<&TransactionRecord> {
        self.index.get(&id).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transactions involving `user`, newest first. Pages are 1-based and
    /// `page_size` is clamped to 1..=100.
    pub fn for_user(&self, user: UserId, page: usize, page_size: usize) -> Page {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let matching: Vec<&TransactionRecord> = self
            .entries
            .iter()
            .rev()
            .filter(|r| r.involves(user))
            .collect();
        let total = matching.len();

        let items = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Page {
            items,
            page,
            page_size,
            total,
        }
    }

    /// The user's full history as a CSV statement, newest first.
    pub fn statement_csv(&self, user: UserId) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());

        for record in self.entries.iter().rev().filter(|r| r.involves(user)) {
            let direction = if record.sender_id == user {
                "sent"
            } else {
                "received"
            };
            let counterparty = if record.sender_id == user {
                record.receiver_id
            } else {
                record.sender_id
            };
            let row = StatementRow {
                transaction: record.id.to_string(),
                date: record.created_at.to_rfc3339(),
                direction,
                counterparty: counterparty.to_string(),
                base_amount: record.base_amount.to_string(),
                discount_percent: record.discount_applied,
                final_amount: record.final_amount.to_string(),
            };
            writer.serialize(&row).expect("failed to write csv row");
        }

        let bytes = writer.into_inner().expect("failed to flush csv writer");
        String::from_utf8(bytes).expect("csv output is utf-8")
    }
}

#[derive(Debug, Serialize)]
struct StatementRow {
    transaction: String,
    date: String,
    direction: &'static str,
    counterparty: String,
    base_amount: String,
    discount_percent: u8,
    final_amount: String,
}

/// A receipt resolved from an immutable ledger record.
#[derive(Debug)]
pub struct Receipt {
    record: TransactionRecord,
    sender_name: String,
    receiver_name: String,
}

impl Receipt {
    pub fn resolve(record: &TransactionRecord, directory: &dyn ProviderDirectory) -> Self {
        let name_of = |user: UserId| {
            directory
                .display_name(user)
                .unwrap_or_else(|| user.to_string())
        };
        Self {
            record: record.clone(),
            sender_name: name_of(record.sender_id),
            receiver_name: name_of(record.receiver_id),
        }
    }

    /// Fixed-format plain-text rendering.
    pub fn render(&self) -> String {
        let r = &self.record;
        let mut out = String::new();
        out.push_str("==== QPay receipt ====\n");
        out.push_str(&format!("transaction:  {}\n", r.id));
        out.push_str(&format!(
            "date:         {}\n",
            r.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!("from:         {}\n", self.sender_name));
        out.push_str(&format!("to:           {}\n", self.receiver_name));
        out.push_str(&format!("base amount:  {}\n", r.base_amount));
        out.push_str(&format!("discount:     {}%\n", r.discount_applied));
        out.push_str(&format!("final amount: {}\n", r.final_amount));
        match r.booking_id {
            Some(id) => out.push_str(&format!("booking:      {id}\n")),
            None => out.push_str("booking:      -\n"),
        }
        match r.request_id {
            Some(id) => out.push_str(&format!("request:      {id}\n")),
            None => out.push_str("request:      -\n"),
        }
        out.push_str(&format!(
            "status:       {}\n",
            match r.status {
                crate::model::TxnStatus::Completed => "completed",
                crate::model::TxnStatus::Failed => "failed",
            }
        ));
        out.push_str("======================\n");
        out
    }
}
