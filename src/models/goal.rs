use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GoalCategory {
    Health,
    Career,
    Personal,
    Finance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GoalTerm {
    Day,
    Month,
    Year,
}

impl std::fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalCategory::Health => write!(f, "Health"),
            GoalCategory::Career => write!(f, "Career"),
            GoalCategory::Personal => write!(f, "Personal"),
            GoalCategory::Finance => write!(f, "Finance"),
        }
    }
}

impl std::str::FromStr for GoalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "health" => Ok(GoalCategory::Health),
            "career" => Ok(GoalCategory::Career),
            "personal" => Ok(GoalCategory::Personal),
            "finance" => Ok(GoalCategory::Finance),
            other => Err(format!("Unknown goal category: {}", other)),
        }
    }
}

impl std::fmt::Display for GoalTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalTerm::Day => write!(f, "Day"),
            GoalTerm::Month => write!(f, "Month"),
            GoalTerm::Year => write!(f, "Year"),
        }
    }
}

impl std::str::FromStr for GoalTerm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(GoalTerm::Day),
            "month" => Ok(GoalTerm::Month),
            "year" => Ok(GoalTerm::Year),
            other => Err(format!("Unknown goal term: {}", other)),
        }
    }
}

/// Optional SMART-framework answers captured by the goal wizard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SmartFields {
    pub specific: Option<String>,
    pub measurable: Option<String>,
    pub achievable: Option<String>,
    pub relevant: Option<String>,
    pub time_bound: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub category: GoalCategory,
    pub term: GoalTerm,
    pub target_date: NaiveDate,
    pub progress: u8,
    #[serde(default)]
    pub smart: SmartFields,
    #[serde(default)]
    pub target_number: Option<f64>,
    #[serde(default)]
    pub current_number: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub title: String,
    pub category: GoalCategory,
    pub term: GoalTerm,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub smart: SmartFields,
    #[serde(default)]
    pub target_number: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Feedback from the optional AI goal review. Never blocks creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalAudit {
    #[serde(rename = "isSmart", alias = "is_smart")]
    pub is_smart: bool,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl GoalAudit {
    pub fn fallback() -> Self {
        Self {
            is_smart: true,
            feedback: "Keep it simple and actionable.".to_string(),
            suggestions: Vec::new(),
        }
    }
}

impl Goal {
    pub fn new(user_id: &str, new_goal: NewGoal) -> Self {
        let numeric = new_goal.target_number.filter(|t| *t > 0.0);
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: new_goal.title.trim().to_string(),
            category: new_goal.category,
            term: new_goal.term,
            target_date: new_goal.target_date,
            progress: 0,
            smart: new_goal.smart,
            target_number: numeric,
            current_number: numeric.map(|_| 0.0),
            unit: new_goal.unit,
            created_at: Utc::now(),
        }
    }

    pub fn is_numerical(&self) -> bool {
        self.target_number.is_some()
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }

    /// Numeric goals derive their percentage from current / target.
    pub fn record_number(&mut self, current: f64) {
        self.current_number = Some(current.max(0.0));
        if let Some(target) = self.target_number {
            let pct = (current.max(0.0) / target * 100.0).floor().min(100.0);
            self.progress = pct as u8;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.progress >= 100
    }
}
