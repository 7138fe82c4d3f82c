use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordering key of a bar.
///
/// Daily bars carry only a calendar date; intraday bars also carry the time of
/// day. The string forms match the data feed (`"2024-01-05"` and
/// `"2024-01-05 09:30:00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarDate {
    stamp: NaiveDateTime,
    intraday: bool,
}

impl BarDate {
    pub fn daily(date: NaiveDate) -> Self {
        Self {
            stamp: date.and_time(NaiveTime::MIN),
            intraday: false,
        }
    }

    pub fn intraday(stamp: NaiveDateTime) -> Self {
        Self {
            stamp,
            intraday: true,
        }
    }

    /// Parse a feed-format date string into a `BarDate`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::daily(date));
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self::intraday)
    }

    pub fn date(&self) -> NaiveDate {
        self.stamp.date()
    }

    pub fn is_intraday(&self) -> bool {
        self.intraday
    }

    /// Human-readable label shown in the hover tooltip.
    pub fn tooltip_label(&self) -> String {
        if self.intraday {
            self.stamp.format("%b %-d, %-I:%M %p").to_string()
        } else {
            self.stamp.format("%b %-d, %Y").to_string()
        }
    }
}

impl fmt::Display for BarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intraday {
            write!(f, "{}", self.stamp.format("%Y-%m-%d %H:%M:%S"))
        } else {
            write!(f, "{}", self.stamp.format("%Y-%m-%d"))
        }
    }
}

impl Serialize for BarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid bar date: {raw}")))
    }
}

/// One trading interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: BarDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    /// `low <= {open, close} <= high` and a non-negative volume.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.volume >= 0.0
    }
}

/// Display-only close derived from the centered smoothing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedPoint {
    pub date: BarDate,
    pub close: f64,
}

/// Chart timeframe selectable by the user.
///
/// String representations match the timeframe buttons (e.g. `"1D"`, `"YTD"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::YearToDate,
        Self::FiveYears,
    ];

    /// Parse a button-format string into a `Timeframe`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1D" => Some(Self::OneDay),
            "1W" => Some(Self::OneWeek),
            "1M" => Some(Self::OneMonth),
            "3M" => Some(Self::ThreeMonths),
            "6M" => Some(Self::SixMonths),
            "1Y" => Some(Self::OneYear),
            "YTD" => Some(Self::YearToDate),
            "5Y" => Some(Self::FiveYears),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::YearToDate => "YTD",
            Self::FiveYears => "5Y",
        }
    }

    /// Comma-separated button labels, for argument errors.
    pub fn choices() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }

    /// `1D` and `1W` are served as intraday bars.
    pub fn is_intraday(self) -> bool {
        matches!(self, Self::OneDay | Self::OneWeek)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Indicator names as shown on the technical menu.
///
/// Declaration order is the render and summary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    #[serde(rename = "MA")]
    MovingAverage,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "BB")]
    Bollinger,
    #[serde(rename = "Stoch")]
    Stochastic,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "OBV")]
    Obv,
    #[serde(rename = "Trendline")]
    Trendline,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 8] = [
        Self::MovingAverage,
        Self::Rsi,
        Self::Macd,
        Self::Bollinger,
        Self::Stochastic,
        Self::Atr,
        Self::Obv,
        Self::Trendline,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MA" => Some(Self::MovingAverage),
            "RSI" => Some(Self::Rsi),
            "MACD" => Some(Self::Macd),
            "BB" => Some(Self::Bollinger),
            "Stoch" => Some(Self::Stochastic),
            "ATR" => Some(Self::Atr),
            "OBV" => Some(Self::Obv),
            "Trendline" => Some(Self::Trendline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MovingAverage => "MA",
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::Bollinger => "BB",
            Self::Stochastic => "Stoch",
            Self::Atr => "ATR",
            Self::Obv => "OBV",
            Self::Trendline => "Trendline",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Self::MovingAverage => "Moving Average",
            Self::Rsi => "Relative Strength Index",
            Self::Macd => "MACD",
            Self::Bollinger => "Bollinger Bands",
            Self::Stochastic => "Stochastic Oscillator",
            Self::Atr => "Average True Range",
            Self::Obv => "On-Balance Volume",
            Self::Trendline => "Trendline",
        }
    }

    /// Menu entries as `MA (Moving Average)`, comma-separated.
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(|k| format!("{} ({})", k.as_str(), k.full_name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Indicators whose values are in price units and share the price axis.
    pub fn is_price_denominated(self) -> bool {
        matches!(
            self,
            Self::MovingAverage | Self::Trendline | Self::Bollinger
        )
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Set of indicators toggled on by the user. Membership only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveIndicators(BTreeSet<IndicatorKind>);

impl ActiveIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `kind`; returns `true` when it is now active.
    pub fn toggle(&mut self, kind: IndicatorKind) -> bool {
        if self.0.remove(&kind) {
            false
        } else {
            self.0.insert(kind);
            true
        }
    }

    pub fn contains(&self, kind: IndicatorKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = IndicatorKind> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<IndicatorKind> for ActiveIndicators {
    fn from_iter<I: IntoIterator<Item = IndicatorKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
