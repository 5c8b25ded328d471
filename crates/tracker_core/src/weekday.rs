use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Days of the week, numbered 1..=7 starting from Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeekDay {
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
    Saturday = 7,
}

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Sunday,
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
    ];

    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(number).ok()?.checked_sub(1)?).copied()
    }

    pub fn from_chrono(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Sun => WeekDay::Sunday,
            chrono::Weekday::Mon => WeekDay::Monday,
            chrono::Weekday::Tue => WeekDay::Tuesday,
            chrono::Weekday::Wed => WeekDay::Wednesday,
            chrono::Weekday::Thu => WeekDay::Thursday,
            chrono::Weekday::Fri => WeekDay::Friday,
            chrono::Weekday::Sat => WeekDay::Saturday,
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            WeekDay::Sunday => "Вс",
            WeekDay::Monday => "Пн",
            WeekDay::Tuesday => "Вт",
            WeekDay::Wednesday => "Ср",
            WeekDay::Thursday => "Чт",
            WeekDay::Friday => "Пт",
            WeekDay::Saturday => "Сб",
        }
    }

    pub fn long_label(self) -> &'static str {
        match self {
            WeekDay::Sunday => "Воскресенье",
            WeekDay::Monday => "Понедельник",
            WeekDay::Tuesday => "Вторник",
            WeekDay::Wednesday => "Среда",
            WeekDay::Thursday => "Четверг",
            WeekDay::Friday => "Пятница",
            WeekDay::Saturday => "Суббота",
        }
    }

    /// Reverse lookup against the short labels, ignoring case.
    pub fn from_short_label(token: &str) -> Option<Self> {
        let folded = token.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.short_label().to_lowercase() == folded)
    }

    /// The seven days rotated so the sequence begins at `first`.
    pub fn ordered_from(first: WeekDay) -> Vec<WeekDay> {
        let start = first.number() as usize - 1;
        Self::ALL[start..]
            .iter()
            .chain(Self::ALL[..start].iter())
            .copied()
            .collect()
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_label())
    }
}

/// Set of weekdays a regular tracker is shown on.
///
/// Persisted as its short labels in canonical order, e.g. `"Пн, Ср"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Schedule {
    days: BTreeSet<WeekDay>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, day: WeekDay) -> bool {
        self.days.contains(&day)
    }

    pub fn insert(&mut self, day: WeekDay) -> bool {
        self.days.insert(day)
    }

    pub fn remove(&mut self, day: WeekDay) -> bool {
        self.days.remove(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = WeekDay> + '_ {
        self.days.iter().copied()
    }

    pub fn every_day() -> Self {
        WeekDay::ALL.into_iter().collect()
    }

    /// Parses a comma separated label list. Unknown tokens are dropped.
    pub fn parse(text: &str) -> Self {
        text.split(',').filter_map(WeekDay::from_short_label).collect()
    }
}

impl FromIterator<WeekDay> for Schedule {
    fn from_iter<I: IntoIterator<Item = WeekDay>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.days.iter().map(|day| day.short_label()).collect();
        f.write_str(&labels.join(", "))
    }
}

impl FromStr for Schedule {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
