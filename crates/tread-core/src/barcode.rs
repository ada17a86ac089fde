//! # Barcode and Invoice Number Generation
//!
//! Pure formatting and parsing for the system's business identifiers.
//! Sequence *allocation* (who hands out the next box number) is tread-db's
//! job; everything here is deterministic math on values passed in.
//!
//! ## Identifier Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Unit barcode (14 chars)                                                │
//! │                                                                         │
//! │    2 6 0 8 1 5 0 0 0 1 2 3 0 7                                         │
//! │    └─YYMMDD─┘ └──box────┘ └pos┘                                        │
//! │     date      6 digits    01-99                                        │
//! │                                                                         │
//! │  Box barcode (18 chars)                                                 │
//! │                                                                         │
//! │    2 6 0 8 1 5 0 0 0 1 2 3 0 0 0 0 0 0                                 │
//! │    └─YYMMDD─┘ └──box────┘ └─"000000"─┘                                 │
//! │                            all-zero tail = "this is a box"             │
//! │                                                                         │
//! │  Invoice number (10 chars)                                              │
//! │                                                                         │
//! │    2 6 0 8 1 5 A 0 0 1                                                 │
//! │    └─YYMMDD─┘ │ └seq┘                                                  │
//! │          store letter (position in sorted store ids)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Position Rollover
//! Positions within a box run are 01-99. Position 100 never exists: past 99
//! the caller allocates a fresh box number and the run restarts at 01.

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::{MAX_BOX_POSITION, STORE_LETTER_SPACE};

/// Width of a unit barcode: YYMMDD + 6-digit box + 2-digit position.
pub const UNIT_BARCODE_LEN: usize = 14;

/// Width of a box barcode: YYMMDD + 6-digit box + 6-zero tail.
pub const BOX_BARCODE_LEN: usize = 18;

/// The all-zero tail marking a barcode as a box, not a unit.
const BOX_TAIL: &str = "000000";

// =============================================================================
// Formatting
// =============================================================================

/// Formats the YYMMDD date prefix shared by all identifiers.
fn date_prefix(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Formats a unit barcode from its parts.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tread_core::barcode::unit_barcode;
///
/// let date = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
/// assert_eq!(unit_barcode(date, 123, 7), "26081500012307");
/// ```
pub fn unit_barcode(date: NaiveDate, box_number: i64, position: i64) -> String {
    format!(
        "{}{:06}{:02}",
        date_prefix(date),
        box_number % 1_000_000,
        position
    )
}

/// Formats a box barcode from its parts.
///
/// Box numbers come from the same per-company counter as unit runs; the
/// literal `000000` tail is what distinguishes the two families.
pub fn box_barcode(date: NaiveDate, box_number: i64) -> String {
    format!(
        "{}{:06}{}",
        date_prefix(date),
        box_number % 1_000_000,
        BOX_TAIL
    )
}

/// Formats an invoice number from its parts.
///
/// The 3-digit sequence is the store's counter value mod 1000: after
/// invoice 999 the suffix wraps to 000. Different stores carry different
/// letters, so two stores issuing the same suffix on the same day do not
/// collide.
pub fn invoice_number(date: NaiveDate, store_letter: char, sequence: i64) -> String {
    format!("{}{}{:03}", date_prefix(date), store_letter, sequence % 1000)
}

/// Derives a store's invoice-number letter from its company's store ids.
///
/// The letter is the store's position among the ids sorted ascending:
/// first store is 'A'. The letter is derived, never stored, so it stays
/// stable as long as no earlier-sorting store is added.
///
/// ## Errors
/// - [`CoreError::StoreNotFound`] when the id is not in the list
/// - [`CoreError::StoreLetterExhausted`] when the store sorts past 'Z'
pub fn store_letter(company_store_ids: &[String], store_id: &str) -> CoreResult<char> {
    let mut sorted: Vec<&str> = company_store_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let position = sorted
        .iter()
        .position(|id| *id == store_id)
        .ok_or_else(|| CoreError::StoreNotFound(store_id.to_string()))?;

    if position >= STORE_LETTER_SPACE {
        return Err(CoreError::StoreLetterExhausted {
            count: position + 1,
        });
    }

    Ok((b'A' + position as u8) as char)
}

// =============================================================================
// Barcode Runs
// =============================================================================

/// A product's progress through its current box number.
///
/// Each product remembers the run it last stamped (`box_number`, last used
/// `position`) so new stock continues the sequence instead of restarting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodeRun {
    pub box_number: i64,
    /// Last position stamped; 0 for a fresh box.
    pub position: i64,
}

impl BarcodeRun {
    /// Starts a fresh run on a newly allocated box number.
    pub const fn new(box_number: i64) -> Self {
        BarcodeRun {
            box_number,
            position: 0,
        }
    }

    /// Resumes a persisted run.
    pub const fn resume(box_number: i64, position: i64) -> Self {
        BarcodeRun {
            box_number,
            position,
        }
    }

    /// True once all 99 positions are used.
    pub const fn is_exhausted(&self) -> bool {
        self.position >= MAX_BOX_POSITION
    }

    /// Claims the next position, or `None` when the run is exhausted and
    /// the caller must allocate a fresh box number.
    pub fn next_position(&mut self) -> Option<i64> {
        if self.is_exhausted() {
            return None;
        }
        self.position += 1;
        Some(self.position)
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// What a scanned identifier turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeKind {
    Unit {
        date: NaiveDate,
        box_number: i64,
        position: i64,
    },
    Box {
        date: NaiveDate,
        box_number: i64,
    },
}

/// Classifies a scanned string by width and digits.
///
/// Returns `None` for anything that is not one of ours: wrong length,
/// non-digits, an impossible date, or an 18-char code without the box tail.
/// Callers treat `None` as "look it up anyway, then report not found":
/// classification is a routing hint, not a validation gate.
pub fn parse_barcode(input: &str) -> Option<BarcodeKind> {
    let input = input.trim();

    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let date = NaiveDate::parse_from_str(&input[..6.min(input.len())], "%y%m%d").ok()?;

    match input.len() {
        UNIT_BARCODE_LEN => {
            let box_number: i64 = input[6..12].parse().ok()?;
            let position: i64 = input[12..14].parse().ok()?;
            Some(BarcodeKind::Unit {
                date,
                box_number,
                position,
            })
        }
        BOX_BARCODE_LEN => {
            if &input[12..] != BOX_TAIL {
                return None;
            }
            let box_number: i64 = input[6..12].parse().ok()?;
            Some(BarcodeKind::Box { date, box_number })
        }
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()
    }

    #[test]
    fn test_unit_barcode_format() {
        assert_eq!(unit_barcode(date(), 123, 7), "26081500012307");
        assert_eq!(unit_barcode(date(), 1, 99), "26081500000199");
        assert_eq!(unit_barcode(date(), 999_999, 1), "26081599999901");
    }

    #[test]
    fn test_box_barcode_format() {
        let code = box_barcode(date(), 123);
        assert_eq!(code, "260815000123000000");
        assert_eq!(code.len(), BOX_BARCODE_LEN);
    }

    #[test]
    fn test_box_number_wraps_at_six_digits() {
        assert_eq!(unit_barcode(date(), 1_000_000, 1), "26081500000001");
        assert_eq!(box_barcode(date(), 1_000_001), "260815000001000000");
    }

    #[test]
    fn test_invoice_number_format_and_wrap() {
        assert_eq!(invoice_number(date(), 'A', 1), "260815A001");
        assert_eq!(invoice_number(date(), 'C', 999), "260815C999");
        // 999 → 000: the documented wrap
        assert_eq!(invoice_number(date(), 'A', 1000), "260815A000");
        assert_eq!(invoice_number(date(), 'A', 1001), "260815A001");
    }

    #[test]
    fn test_store_letter_sorted_position() {
        let ids = vec![
            "store-c".to_string(),
            "store-a".to_string(),
            "store-b".to_string(),
        ];
        assert_eq!(store_letter(&ids, "store-a").unwrap(), 'A');
        assert_eq!(store_letter(&ids, "store-b").unwrap(), 'B');
        assert_eq!(store_letter(&ids, "store-c").unwrap(), 'C');
    }

    #[test]
    fn test_store_letter_unknown_store() {
        let ids = vec!["store-a".to_string()];
        assert!(matches!(
            store_letter(&ids, "store-x"),
            Err(CoreError::StoreNotFound(_))
        ));
    }

    #[test]
    fn test_store_letter_exhausted_past_z() {
        let ids: Vec<String> = (0..27).map(|i| format!("store-{:02}", i)).collect();
        // stores 00..=25 still fit
        assert_eq!(store_letter(&ids, "store-25").unwrap(), 'Z');
        // the 27th store has no letter
        assert!(matches!(
            store_letter(&ids, "store-26"),
            Err(CoreError::StoreLetterExhausted { count: 27 })
        ));
    }

    #[test]
    fn test_barcode_run_advances_and_exhausts() {
        let mut run = BarcodeRun::new(42);
        assert_eq!(run.next_position(), Some(1));
        assert_eq!(run.next_position(), Some(2));

        let mut run = BarcodeRun::resume(42, 98);
        assert!(!run.is_exhausted());
        assert_eq!(run.next_position(), Some(99));
        assert!(run.is_exhausted());
        assert_eq!(run.next_position(), None);
    }

    #[test]
    fn test_parse_unit_barcode() {
        let parsed = parse_barcode("26081500012307");
        assert_eq!(
            parsed,
            Some(BarcodeKind::Unit {
                date: date(),
                box_number: 123,
                position: 7,
            })
        );
    }

    #[test]
    fn test_parse_box_barcode() {
        let parsed = parse_barcode("260815000123000000");
        assert_eq!(
            parsed,
            Some(BarcodeKind::Box {
                date: date(),
                box_number: 123,
            })
        );
    }

    #[test]
    fn test_parse_rejects_foreign_codes() {
        // EAN-13 from another system: wrong width
        assert_eq!(parse_barcode("5449000000996"), None);
        // 18 digits without the box tail
        assert_eq!(parse_barcode("260815000123000001"), None);
        // non-digits
        assert_eq!(parse_barcode("26081500012A07"), None);
        // impossible date
        assert_eq!(parse_barcode("26139900012307"), None);
        assert_eq!(parse_barcode(""), None);
    }

    #[test]
    fn test_format_parse_round_trip() {
        let code = unit_barcode(date(), 4321, 55);
        assert_eq!(
            parse_barcode(&code),
            Some(BarcodeKind::Unit {
                date: date(),
                box_number: 4321,
                position: 55,
            })
        );
    }
}
