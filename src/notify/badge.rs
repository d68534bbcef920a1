use crate::domain::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub text: &'static str,
    pub color: &'static str,
}

pub fn badge_for(level: RiskLevel) -> Badge {
    match level {
        RiskLevel::High => Badge {
            text: "HIGH",
            color: "#b83232",
        },
        RiskLevel::Medium => Badge {
            text: "MED",
            color: "#b7791f",
        },
        RiskLevel::Low => Badge {
            text: "LOW",
            color: "#2d7d46",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_level_has_its_badge() {
        assert_eq!(badge_for(RiskLevel::High), Badge { text: "HIGH", color: "#b83232" });
        assert_eq!(badge_for(RiskLevel::Medium), Badge { text: "MED", color: "#b7791f" });
        assert_eq!(badge_for(RiskLevel::Low), Badge { text: "LOW", color: "#2d7d46" });
    }
}
