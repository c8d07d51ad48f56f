use crate::error::Result;
use crate::models::{ObservationRecord, YearlyStatistic};
use crate::utils::constants::{DEFAULT_PAGE, DEFAULT_PER_PAGE};
use chrono::NaiveDate;
use serde::Serialize;
use validator::Validate;

/// Filter over raw observations. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationFilter {
    pub station_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ObservationFilter {
    pub fn matches(&self, record: &ObservationRecord) -> bool {
        self.station_id
            .as_deref()
            .map_or(true, |id| record.station_id == id)
            && self.start_date.map_or(true, |start| record.date >= start)
            && self.end_date.map_or(true, |end| record.date <= end)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsFilter {
    pub station_id: Option<String>,
    pub year: Option<i32>,
}

impl StatisticsFilter {
    pub fn matches(&self, statistic: &YearlyStatistic) -> bool {
        self.station_id
            .as_deref()
            .map_or(true, |id| statistic.station_id == id)
            && self.year.map_or(true, |year| statistic.year == year)
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 1000))]
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Result<Self> {
        let request = Self { page, per_page };
        request.validate()?;
        Ok(request)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            pages: total_pages(total, request.per_page),
            current_page: request.page,
            per_page: request.per_page,
        }
    }

    /// Slice an already filtered, ordered sequence.
    pub fn from_sorted<I>(matching: I, request: &PageRequest) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut total = 0u64;
        let mut items = Vec::new();
        let offset = request.offset();
        let limit = request.limit();

        for item in matching {
            if total >= offset && total < offset + limit {
                items.push(item);
            }
            total += 1;
        }

        Self::new(items, total, request)
    }
}

pub fn total_pages(total: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(u64::from(per_page))
}
