use nb_core::{Article, BiasDistribution, OutletClassifier, PoliticalLean};

/// Percentage of `members` per political bucket.
///
/// Each bucket is rounded on its own, so the three values can sum to 99 or 101.
pub fn bias_distribution(members: &[Article], classifier: &dyn OutletClassifier) -> BiasDistribution {
    if members.is_empty() {
        return BiasDistribution::default();
    }
    let (mut left, mut center, mut right) = (0usize, 0usize, 0usize);
    for member in members {
        match classifier.lean(&member.source_name) {
            PoliticalLean::Left => left += 1,
            PoliticalLean::Center => center += 1,
            PoliticalLean::Right => right += 1,
        }
    }
    let total = members.len() as f64;
    let pct = |count: usize| (count as f64 / total * 100.0).round() as u32;
    BiasDistribution {
        left: pct(left),
        center: pct(center),
        right: pct(right),
    }
}

/// Every member outlet sits in the same bucket.
pub fn is_blindspot(distribution: &BiasDistribution) -> bool {
    distribution.is_single_perspective()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_core::StaticOutletTable;

    fn from(outlets: &[&str]) -> Vec<Article> {
        outlets
            .iter()
            .enumerate()
            .map(|(i, outlet)| {
                let raw = nb_core::RawArticle {
                    title: Some(format!("Story {i}")),
                    url: Some(format!("https://example.com/{i}")),
                    source_name: Some(outlet.to_string()),
                    ..Default::default()
                };
                nb_core::canonicalize(raw, "rss", chrono::Utc::now()).unwrap()
            })
            .collect()
    }

    #[test]
    fn thirds_do_not_sum_to_one_hundred() {
        let members = from(&["CNN", "Reuters", "Fox News"]);
        let dist = bias_distribution(&members, &StaticOutletTable);
        assert_eq!(dist, BiasDistribution { left: 33, center: 33, right: 33 });
        assert!(!is_blindspot(&dist));
    }

    #[test]
    fn unknown_outlets_count_as_center() {
        let members = from(&["Springfield Shopper", "Reuters"]);
        let dist = bias_distribution(&members, &StaticOutletTable);
        assert_eq!(dist, BiasDistribution { left: 0, center: 100, right: 0 });
        assert!(is_blindspot(&dist));
    }

    #[test]
    fn two_thirds_round_up() {
        let members = from(&["CNN", "MSNBC", "Fox News"]);
        let dist = bias_distribution(&members, &StaticOutletTable);
        assert_eq!(dist, BiasDistribution { left: 67, center: 0, right: 33 });
    }
}
