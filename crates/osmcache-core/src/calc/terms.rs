use chrono::NaiveDate;

use crate::models::{Term, TermId};

/// The parts of a term that date selection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSpan {
    pub id: TermId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TermSpan {
    pub fn new(id: TermId, start: NaiveDate, end: NaiveDate) -> Self {
        Self { id, start, end }
    }

    /// Span of a cached term, once both dates are known.
    pub fn of(term: &Term) -> Option<Self> {
        let (start, end) = term.span()?;
        Some(Self::new(term.id, start, end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Pick the term that is "current" on `date`.
///
/// 1. Among terms containing the date, the shortest wins; ties go to the
///    earlier start, then the lower id.
/// 2. Otherwise the latest term that started on or before the date
///    (ties: lower id).
/// 3. Otherwise the earliest term starting after the date (ties: lower id).
///
/// Terms are never merged or normalised; overlaps and gaps are expected.
pub fn term_at(spans: &[TermSpan], date: NaiveDate) -> Option<TermId> {
    let containing = spans
        .iter()
        .filter(|t| t.contains(date))
        .min_by_key(|t| (t.length_days(), t.start, t.id));
    if let Some(term) = containing {
        return Some(term.id);
    }

    let latest_past = spans
        .iter()
        .filter(|t| t.start <= date)
        .min_by_key(|t| (std::cmp::Reverse(t.start), t.id));
    if let Some(term) = latest_past {
        return Some(term.id);
    }

    spans
        .iter()
        .filter(|t| t.start > date)
        .min_by_key(|t| (t.start, t.id))
        .map(|t| t.id)
}
