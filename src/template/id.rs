//! Process-unique ids: `<prefix>_<entropy>_<time>`.
//!
//! The time part is milliseconds since the epoch in base 36, bumped so it
//! strictly increases within the process even when the clock stalls or
//! steps backwards.

use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

const ENTROPY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Template,
    Option,
}

impl IdKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Template => "tpl",
            IdKind::Option => "opt",
        }
    }
}

pub fn generate_id(kind: IdKind) -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        kind.prefix(),
        &entropy[..ENTROPY_LEN],
        to_base36(next_millis() as u64)
    )
}

fn next_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let prev = LAST_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(prev + 1)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
