use serde::Serialize;

use super::domain::{Notification, NotificationId, Severity};

/// How many affected services are named before the rest are counted.
const NAMED_SERVICE_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub disruptions: Vec<Notification>,
    pub others: Vec<Notification>,
}

/// Splits notices into service disruptions and standalone notices, keeping
/// input order within each group.
pub fn partition(notices: &[Notification]) -> Partition {
    let (disruptions, others): (Vec<Notification>, Vec<Notification>) = notices
        .iter()
        .cloned()
        .partition(Notification::is_disruption);
    Partition {
        disruptions,
        others,
    }
}

/// Most urgent ordered severity present, `Info` when none is.
pub fn worst_severity(notices: &[Notification]) -> Severity {
    Severity::ordered()
        .into_iter()
        .find(|level| notices.iter().any(|notice| &notice.severity == level))
        .unwrap_or(Severity::Info)
}

/// Sentence naming the affected services, or `None` for an empty group.
pub fn summarize(disruptions: &[Notification]) -> Option<String> {
    if disruptions.is_empty() {
        return None;
    }

    let names: Vec<&str> = disruptions
        .iter()
        .take(NAMED_SERVICE_LIMIT)
        .map(Notification::display_name)
        .collect();

    let mut affected = match names.as_slice() {
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
        [] => String::new(),
    };

    let remaining = disruptions.len().saturating_sub(NAMED_SERVICE_LIMIT);
    if remaining > 0 {
        let noun = if remaining == 1 { "other" } else { "others" };
        affected.push_str(&format!(" and {remaining} {noun}"));
    }

    Some(format!(
        "We're currently experiencing issues with {affected}. Our team is looking into it."
    ))
}

/// Consolidated banner entry for every visible service disruption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisruptionGroup {
    pub ids: Vec<NotificationId>,
    pub severity: Severity,
    pub summary: String,
    /// Only set when every notice in the group can be dismissed.
    pub dismissible: bool,
}

/// Render model for the banner region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BannerView {
    pub disruption: Option<DisruptionGroup>,
    pub notices: Vec<Notification>,
}

impl BannerView {
    pub fn is_empty(&self) -> bool {
        self.disruption.is_none() && self.notices.is_empty()
    }
}

pub fn classify(visible: &[Notification]) -> BannerView {
    let Partition {
        disruptions,
        others,
    } = partition(visible);

    let disruption = summarize(&disruptions).map(|summary| DisruptionGroup {
        ids: disruptions.iter().map(|notice| notice.id.clone()).collect(),
        severity: worst_severity(&disruptions),
        summary,
        dismissible: disruptions.iter().all(|notice| notice.dismissible),
    });

    BannerView {
        disruption,
        notices: others,
    }
}
