/// Prefix of every automatically assigned invoice number.
pub const INVOICE_PREFIX: &str = "fac-";

const SUFFIX_DIGITS: usize = 4;

/// Next free number within one year, derived from the numbers already
/// issued: `{prefix}{year}-NNNN`, e.g. "fac-2024-0007".
///
/// Nothing is persisted between calls and no lock is held. Two creations
/// resumed from the same snapshot compute the same number; the store's
/// uniqueness constraint rejects the second one.
#[derive(Debug, Clone)]
pub struct InvoiceNumberSequence {
    year_prefix: String,
    next: u64,
}

impl InvoiceNumberSequence {
    /// Resume after the highest number already issued for `year`.
    ///
    /// Only numbers shaped `{prefix}{year}-NNNN` (exactly four digits)
    /// count. Other years, manual numbers and longer suffixes are ignored.
    pub fn resume<'a, I>(prefix: &str, year: i32, existing: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let year_prefix = format!("{prefix}{year}-");
        let highest = existing
            .into_iter()
            .filter_map(|n| n.strip_prefix(year_prefix.as_str()))
            .filter(|suffix| {
                suffix.len() == SUFFIX_DIGITS && suffix.bytes().all(|b| b.is_ascii_digit())
            })
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            year_prefix,
            next: highest + 1,
        }
    }

    /// Take the next number.
    pub fn next_number(&mut self) -> String {
        let number = self.peek();
        self.next += 1;
        number
    }

    /// The next number, without taking it.
    pub fn peek(&self) -> String {
        format!(
            "{}{:0>width$}",
            self.year_prefix,
            self.next,
            width = SUFFIX_DIGITS
        )
    }

    /// `{prefix}{year}-`, shared by every number of the sequence.
    pub fn year_prefix(&self) -> &str {
        &self.year_prefix
    }
}
