use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use pubscope_core::domain::{DateRange, MembershipGroup};

use crate::facts::DailyStat;
use crate::repositories::{RepositoryError, StatsRepository};
use crate::DbPool;

/// Deterministic demo warehouse: six months of daily facts for a handful of
/// zones, shaped so that a January versus February comparison exercises
/// every lifecycle status and several warning rules.
const DEMO_ZONES: &[ZoneSeed] = &[
    ZoneSeed {
        owner: "alice",
        publisher: ("pub-news", "Daily Newsroom"),
        media: ("news-web", "newsroom.example"),
        product: "display",
        zone: ("news-top", "Homepage leaderboard"),
        daily_revenue: 1_200,
        revenue_trend_pct: 2,
        daily_requests: 400_000,
        request_trend_pct: 1,
        fill_pct: 85,
        active: (None, None),
    },
    ZoneSeed {
        owner: "alice",
        publisher: ("pub-news", "Daily Newsroom"),
        media: ("news-web", "newsroom.example"),
        product: "video",
        zone: ("news-preroll", "Article preroll"),
        daily_revenue: 450,
        revenue_trend_pct: 5,
        daily_requests: 60_000,
        request_trend_pct: 4,
        fill_pct: 70,
        active: (None, None),
    },
    ZoneSeed {
        owner: "alice",
        publisher: ("pub-news", "Daily Newsroom"),
        media: ("news-app", "Newsroom app"),
        product: "display",
        zone: ("app-banner", "In-app banner"),
        daily_revenue: 300,
        revenue_trend_pct: -15,
        daily_requests: 150_000,
        request_trend_pct: -12,
        fill_pct: 60,
        active: (None, None),
    },
    ZoneSeed {
        owner: "bob",
        publisher: ("pub-games", "Arcade Hub"),
        media: ("games-web", "arcadehub.example"),
        product: "display",
        zone: ("games-side", "Sidebar"),
        daily_revenue: 220,
        revenue_trend_pct: 0,
        daily_requests: 90_000,
        request_trend_pct: 0,
        fill_pct: 75,
        active: (None, None),
    },
    ZoneSeed {
        owner: "bob",
        publisher: ("pub-games", "Arcade Hub"),
        media: ("games-web", "arcadehub.example"),
        product: "native",
        zone: ("games-feed", "Feed native"),
        daily_revenue: 90,
        revenue_trend_pct: 3,
        daily_requests: 30_000,
        request_trend_pct: 2,
        fill_pct: 50,
        active: (None, Some((2026, 1, 31))),
    },
    ZoneSeed {
        owner: "carol",
        publisher: ("pub-recipes", "Kitchen Table"),
        media: ("recipes-web", "kitchentable.example"),
        product: "native",
        zone: ("recipes-inline", "Recipe inline"),
        daily_revenue: 140,
        revenue_trend_pct: 0,
        daily_requests: 40_000,
        request_trend_pct: 0,
        fill_pct: 65,
        active: (Some((2026, 2, 1)), None),
    },
    ZoneSeed {
        owner: "carol",
        publisher: ("pub-recipes", "Kitchen Table"),
        media: ("recipes-web", "kitchentable.example"),
        product: "display",
        zone: ("recipes-footer", "Footer"),
        daily_revenue: 60,
        revenue_trend_pct: -8,
        daily_requests: 50_000,
        request_trend_pct: -12,
        fill_pct: 40,
        active: (None, None),
    },
    ZoneSeed {
        owner: "dave",
        publisher: ("pub-travel", "Wander Guide"),
        media: ("travel-web", "wanderguide.example"),
        product: "video",
        zone: ("travel-outstream", "Outstream"),
        daily_revenue: 75,
        revenue_trend_pct: 1,
        daily_requests: 20_000,
        request_trend_pct: 1,
        fill_pct: 55,
        active: (None, Some((2026, 1, 31))),
    },
];

const DEMO_TEAMS: &[(&str, &str, &[&str])] =
    &[("north", "North desk", &["alice", "bob"]), ("south", "South desk", &["carol"])];

const FIRST_DAY: (i32, u32, u32) = (2025, 8, 1);
const LAST_DAY: (i32, u32, u32) = (2026, 2, 28);

#[derive(Debug, Clone, Copy)]
struct ZoneSeed {
    owner: &'static str,
    publisher: (&'static str, &'static str),
    media: (&'static str, &'static str),
    product: &'static str,
    zone: (&'static str, &'static str),
    /// Whole currency units per day in the first month.
    daily_revenue: i64,
    /// Change per elapsed month, in percent of the first month.
    revenue_trend_pct: i64,
    daily_requests: i64,
    request_trend_pct: i64,
    fill_pct: i64,
    active: (Option<(i32, u32, u32)>, Option<(i32, u32, u32)>),
}

impl ZoneSeed {
    fn stat_for(&self, day: NaiveDate, months_elapsed: i64) -> Option<DailyStat> {
        let (from, until) = self.active;
        if from.and_then(ymd).is_some_and(|from| day < from)
            || until.and_then(ymd).is_some_and(|until| day > until)
        {
            return None;
        }

        let scale = |base: i64, trend: i64| (base * (100 + trend * months_elapsed) / 100).max(0);
        let requests = scale(self.daily_requests, self.request_trend_pct) as u64;
        let paid = requests * self.fill_pct as u64 / 100;
        // Cents keep the daily figures exact in decimal.
        let revenue_cents = scale(self.daily_revenue * 100, self.revenue_trend_pct);
        let revenue = Decimal::new(revenue_cents, 2);
        let unit_price = (paid > 0).then(|| revenue_cents as f64 / 100.0 / paid as f64 * 1000.0);

        Some(DailyStat {
            stat_date: day,
            account_owner: self.owner.to_string(),
            publisher_id: self.publisher.0.to_string(),
            publisher_name: self.publisher.1.to_string(),
            media_id: self.media.0.to_string(),
            media_name: self.media.1.to_string(),
            product: self.product.to_string(),
            zone_id: self.zone.0.to_string(),
            zone_name: self.zone.1.to_string(),
            requests,
            paid,
            revenue,
            unit_price,
        })
    }
}

fn ymd((year, month, day): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub facts: usize,
    pub groups: usize,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoDataset;

impl DemoDataset {
    /// The comparison the dataset is shaped for: January against February 2026.
    pub fn periods() -> Result<(DateRange, DateRange), RepositoryError> {
        let parse = |value: &str| {
            value.parse::<DateRange>().map_err(|error| RepositoryError::Decode(error.to_string()))
        };
        Ok((parse("2026-01-01..2026-01-31")?, parse("2026-02-01..2026-02-28")?))
    }

    pub fn facts() -> Vec<DailyStat> {
        let (Some(first), Some(last)) = (ymd(FIRST_DAY), ymd(LAST_DAY)) else {
            return Vec::new();
        };

        let mut facts = Vec::new();
        let mut day = first;
        while day <= last {
            let months_elapsed = i64::from(day.year() - first.year()) * 12
                + i64::from(day.month()) - i64::from(first.month());
            facts.extend(DEMO_ZONES.iter().filter_map(|zone| zone.stat_for(day, months_elapsed)));
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }
        facts
    }

    pub fn groups() -> Vec<MembershipGroup> {
        DEMO_TEAMS
            .iter()
            .map(|(group_id, group_name, members)| MembershipGroup {
                group_id: group_id.to_string(),
                group_name: group_name.to_string(),
                member_ids: members.iter().map(|member| member.to_string()).collect(),
            })
            .collect()
    }

    /// Writes the dataset through any stats repository. Re-running is idempotent.
    pub async fn load<R: StatsRepository + ?Sized>(
        repository: &R,
    ) -> Result<SeedSummary, RepositoryError> {
        let facts = Self::facts();
        repository.record(&facts).await?;
        let groups = Self::groups();
        for group in &groups {
            repository.save_group(group).await?;
        }

        let first_day = facts.iter().map(|fact| fact.stat_date).min();
        let last_day = facts.iter().map(|fact| fact.stat_date).max();
        match (first_day, last_day) {
            (Some(first_day), Some(last_day)) => {
                Ok(SeedSummary { facts: facts.len(), groups: groups.len(), first_day, last_day })
            }
            _ => Err(RepositoryError::Encode("demo dataset produced no facts".to_string())),
        }
    }

    /// Checks that the seeded rows are present in a SQLite warehouse.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let expected_facts = Self::facts().len() as i64;
        let fact_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM ad_daily_stats")
            .fetch_one(pool)
            .await?;
        checks.push(("daily-facts", fact_count >= expected_facts));

        for zone in DEMO_ZONES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM ad_daily_stats WHERE zone_id = ?1 AND product = ?2)",
            )
            .bind(zone.zone.0)
            .bind(zone.product)
            .fetch_one(pool)
            .await?;
            checks.push((zone.zone.0, present == 1));
        }

        for &(group_id, _, members) in DEMO_TEAMS {
            let member_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM team_members WHERE group_id = ?1")
                    .bind(group_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((group_id, member_count == members.len() as i64));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes every demo fact and team.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for zone in DEMO_ZONES {
            sqlx::query("DELETE FROM ad_daily_stats WHERE zone_id = ?1 AND product = ?2")
                .bind(zone.zone.0)
                .bind(zone.product)
                .execute(&mut *tx)
                .await?;
        }
        for &(group_id, _, _) in DEMO_TEAMS {
            sqlx::query("DELETE FROM team_members WHERE group_id = ?1")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM team_groups WHERE group_id = ?1")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
