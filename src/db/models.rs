use crate::types::{Account, ExternalAccount, GeoPoint, LocalAccount, Restaurant};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAccount {
    pub id: i64,
    pub identity: String,
    pub kind: String,
    pub user_name: Option<String>,
    pub password_digest: Option<String>,
    pub thumbnail_image: Option<String>,
}

impl TryFrom<DbAccount> for Account {
    type Error = sqlx::Error;

    fn try_from(d: DbAccount) -> Result<Self, Self::Error> {
        match d.kind.as_str() {
            "local" => match (d.user_name, d.password_digest) {
                (Some(user_name), Some(password_digest)) => Ok(Account::Local(LocalAccount {
                    identity: d.identity,
                    user_name,
                    password_digest,
                    thumbnail_image: d.thumbnail_image.unwrap_or_default(),
                })),
                _ => Err(sqlx::Error::Decode(
                    format!("local account {} is missing credentials", d.identity).into(),
                )),
            },
            "external" => Ok(Account::External(ExternalAccount {
                identity: d.identity,
                user_name: d.user_name,
                password_digest: d.password_digest,
                thumbnail_image: d.thumbnail_image,
                profile: None,
            })),
            other => Err(sqlx::Error::Decode(
                format!("unknown account kind {other:?}").into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbRestaurant {
    pub restaurant_id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub rating_average: f64,
    pub rating_count: i64,
    pub url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub categories: String,
}

impl TryFrom<DbRestaurant> for Restaurant {
    type Error = sqlx::Error;

    fn try_from(d: DbRestaurant) -> Result<Self, Self::Error> {
        let categories: Vec<String> =
            serde_json::from_str(&d.categories).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let location = match (d.latitude, d.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        Ok(Restaurant {
            restaurant_id: d.restaurant_id,
            name: d.name,
            address: d.address,
            city: d.city,
            state: d.state,
            rating_average: d.rating_average,
            rating_count: d.rating_count,
            url: d.url,
            location,
            categories,
        })
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbBookmark {
    pub id: i64,
    pub owner_identity: String,
    pub restaurant_id: String,
    pub note: String,
    pub updated_at: String,
}

/// Fixed-width RFC3339 so text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str) -> DbAccount {
        DbAccount {
            id: 1,
            identity: "local:alice".into(),
            kind: kind.into(),
            user_name: Some("alice".into()),
            password_digest: Some("digest".into()),
            thumbnail_image: None,
        }
    }

    #[test]
    fn rows_map_onto_the_tagged_variant() {
        assert!(matches!(Account::try_from(row("local")), Ok(Account::Local(_))));
        assert!(matches!(Account::try_from(row("external")), Ok(Account::External(_))));
        assert!(Account::try_from(row("robot")).is_err());
    }

    #[test]
    fn local_rows_without_digest_are_rejected() {
        let mut broken = row("local");
        broken.password_digest = None;
        assert!(Account::try_from(broken).is_err());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(3);
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(
            parse_timestamp(&timestamp(early)).unwrap().timestamp_micros(),
            early.timestamp_micros()
        );
    }
}
