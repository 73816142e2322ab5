use anyhow::{anyhow, Result};
use std::collections::BTreeSet;

use crate::selection::PageNumber;

/// Highest page that can be named before the page count is known.
pub const MAX_PAGE_WITHOUT_COUNT: PageNumber = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange {
    pub start: PageRef,
    pub end: Option<PageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    Number(u32),
    End,
}

impl PageRange {
    /// Parse a page range specification like "1-5", "9-6", "1-end"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Empty page range"));
        }

        if let Some(dash_pos) = s.find('-') {
            // "-5" is not a range
            if dash_pos == 0 {
                return Err(anyhow!("Invalid page range: {}", s));
            }

            let start = parse_page_ref(&s[..dash_pos])?;
            let end = parse_page_ref(&s[dash_pos + 1..])?;

            Ok(PageRange {
                start,
                end: Some(end),
            })
        } else {
            Ok(PageRange {
                start: parse_page_ref(s)?,
                end: None,
            })
        }
    }

    /// Expand this range into 1-based page numbers.
    ///
    /// Without a page count only numeric bounds can be resolved, and they
    /// are capped at [`MAX_PAGE_WITHOUT_COUNT`].
    pub fn expand(&self, total_pages: Option<u32>) -> Result<Vec<PageNumber>> {
        let resolve = |r: &PageRef| match r {
            PageRef::Number(n) => Ok(*n),
            PageRef::End => {
                total_pages.ok_or_else(|| anyhow!("\"end\" needs a loaded document"))
            }
        };

        let start = resolve(&self.start)?;
        let end = match &self.end {
            Some(r) => resolve(r)?,
            None => start,
        };

        if start == 0 || end == 0 {
            return Err(anyhow!("Page numbers must be >= 1"));
        }

        let highest = start.max(end);
        match total_pages {
            Some(total) if highest > total => {
                return Err(anyhow!("Page {} exceeds total pages {}", highest, total));
            }
            None if highest > MAX_PAGE_WITHOUT_COUNT => {
                return Err(anyhow!(
                    "Page {} is too high to select before the document has loaded",
                    highest
                ));
            }
            _ => {}
        }

        let pages: Vec<PageNumber> = if start <= end {
            (start..=end).collect()
        } else {
            (end..=start).rev().collect()
        };

        Ok(pages)
    }
}

fn parse_page_ref(s: &str) -> Result<PageRef> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("end") {
        Ok(PageRef::End)
    } else {
        s.parse::<u32>()
            .map(PageRef::Number)
            .map_err(|_| anyhow!("Invalid page number: {}", s))
    }
}

/// Parse a comma-separated list of page ranges like "1-5,10,15-end"
pub fn parse_page_ranges(s: &str) -> Result<Vec<PageRange>> {
    s.split(',')
        .map(|part| PageRange::parse(part.trim()))
        .collect()
}

/// Expand a page range string into the distinct pages it names, ascending.
pub fn expand_page_ranges(s: &str, total_pages: Option<u32>) -> Result<Vec<PageNumber>> {
    let mut pages = BTreeSet::new();
    for range in parse_page_ranges(s)? {
        pages.extend(range.expand(total_pages)?);
    }
    Ok(pages.into_iter().collect())
}
