use crate::traits::FeedStore;
use crate::types::{AggregatorError, Category, Result, SearchTag, Source};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Pool, Postgres, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    categories: Vec<Category>,
    sources: HashMap<Uuid, Source>,
    tags: HashMap<Uuid, SearchTag>,
    category_sources: HashMap<Uuid, Vec<Uuid>>,
    category_tags: HashMap<Uuid, Vec<Uuid>>,
}

impl StoreState {
    fn category(&self, id: Uuid) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or(AggregatorError::CategoryNotFound { id })
    }
}

/// In-process store. Categories keep insertion order, as do their sources.
#[derive(Default)]
pub struct MemoryFeedStore {
    state: RwLock<StoreState>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.state.read().await.category(id).cloned()
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state.write().await.categories.push(category.clone());
        Ok(category)
    }

    async fn list_sources(&self, category_id: Uuid) -> Result<Vec<Source>> {
        let state = self.state.read().await;
        state.category(category_id)?;
        Ok(state
            .category_sources
            .get(&category_id)
            .map(|ids| ids.iter().filter_map(|id| state.sources.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn list_tags(&self, category_id: Uuid) -> Result<Vec<SearchTag>> {
        let state = self.state.read().await;
        state.category(category_id)?;
        Ok(state
            .category_tags
            .get(&category_id)
            .map(|ids| ids.iter().filter_map(|id| state.tags.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn add_source(&self, category_id: Uuid, source: Source) -> Result<()> {
        let mut state = self.state.write().await;
        state.category(category_id)?;

        let source_id = source.id;
        state.sources.entry(source_id).or_insert(source);
        let ids = state.category_sources.entry(category_id).or_default();
        if !ids.contains(&source_id) {
            ids.push(source_id);
        }
        Ok(())
    }

    async fn add_tag(&self, category_id: Uuid, name: &str) -> Result<SearchTag> {
        let mut state = self.state.write().await;
        state.category(category_id)?;

        let tag = SearchTag::new(name);
        state.tags.insert(tag.id, tag.clone());
        state.category_tags.entry(category_id).or_default().push(tag.id);
        Ok(tag)
    }

    async fn delete_source(&self, id: Uuid) -> Result<Source> {
        let mut state = self.state.write().await;
        let source = state
            .sources
            .remove(&id)
            .ok_or(AggregatorError::SourceNotFound { id })?;
        for ids in state.category_sources.values_mut() {
            ids.retain(|source_id| *source_id != id);
        }
        Ok(source)
    }

    async fn source_exists(&self, category_id: Uuid, link: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .category_sources
            .get(&category_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.sources.get(id))
                    .any(|s| s.link == link)
            })
            .unwrap_or(false))
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id UUID PRIMARY KEY,
        name VARCHAR(30) NOT NULL,
        created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id UUID PRIMARY KEY,
        name VARCHAR(256) NOT NULL,
        link VARCHAR(256) NOT NULL,
        created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS search_tags (
        id UUID PRIMARY KEY,
        name VARCHAR(100) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS category_sources (
        category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        position BIGSERIAL,
        PRIMARY KEY (category_id, source_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS category_tags (
        category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        tag_id UUID NOT NULL REFERENCES search_tags(id) ON DELETE CASCADE,
        position BIGSERIAL,
        PRIMARY KEY (category_id, tag_id)
    )
    "#,
];

/// PostgreSQL store for multi-process deployments.
pub struct PgFeedStore {
    db: Pool<Postgres>,
}

impl PgFeedStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self { db })
    }

    pub async fn setup_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db).await?;
        }
        debug!("Feed store schema ready");
        Ok(())
    }

    fn category_from_row(row: &PgRow) -> Result<Category> {
        Ok(Category {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    fn source_from_row(row: &PgRow) -> Result<Source> {
        Ok(Source {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            link: row.try_get("link")?,
        })
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY created_at")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(Self::category_from_row).collect()
    }

    async fn get_category(&self, id: Uuid) -> Result<Category> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Self::category_from_row(&row),
            None => Err(AggregatorError::CategoryNotFound { id }),
        }
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };

        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id)
            .bind(&category.name)
            .execute(&self.db)
            .await?;

        info!("Added new category: {} with ID: {}", category.name, category.id);
        Ok(category)
    }

    async fn list_sources(&self, category_id: Uuid) -> Result<Vec<Source>> {
        self.get_category(category_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.link
            FROM category_sources cs
            JOIN sources s ON s.id = cs.source_id
            WHERE cs.category_id = $1
            ORDER BY cs.position
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::source_from_row).collect()
    }

    async fn list_tags(&self, category_id: Uuid) -> Result<Vec<SearchTag>> {
        self.get_category(category_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name
            FROM category_tags ct
            JOIN search_tags t ON t.id = ct.tag_id
            WHERE ct.category_id = $1
            ORDER BY ct.position
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.db)
        .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(SearchTag {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }
        Ok(tags)
    }

    async fn add_source(&self, category_id: Uuid, source: Source) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sources (id, name, link)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.link)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO category_sources (category_id, source_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(category_id)
        .bind(source.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Added source {} to category {}", source.link, category_id);
        Ok(())
    }

    async fn add_tag(&self, category_id: Uuid, name: &str) -> Result<SearchTag> {
        let tag = SearchTag::new(name);
        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO search_tags (id, name) VALUES ($1, $2)")
            .bind(tag.id)
            .bind(&tag.name)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO category_tags (category_id, tag_id) VALUES ($1, $2)")
            .bind(category_id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(tag)
    }

    async fn delete_source(&self, id: Uuid) -> Result<Source> {
        let row = sqlx::query("DELETE FROM sources WHERE id = $1 RETURNING id, name, link")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Self::source_from_row(&row),
            None => Err(AggregatorError::SourceNotFound { id }),
        }
    }

    async fn source_exists(&self, category_id: Uuid, link: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM category_sources cs
                JOIN sources s ON s.id = cs.source_id
                WHERE cs.category_id = $1 AND s.link = $2
            )
            "#,
        )
        .bind(category_id)
        .bind(link)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }
}
