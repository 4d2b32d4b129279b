use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Meal, MealStats, User};

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Database { pool };
        db.init_tables().await?;
        Ok(db)
    }

    /// Wrap an existing pool without creating tables
    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Database { pool }
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meals (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                image_path TEXT,
                image_url TEXT,
                comments TEXT,
                calories DOUBLE PRECISION NOT NULL DEFAULT 0,
                description TEXT,
                breakdown TEXT,
                confidence_score DOUBLE PRECISION NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS meals_user_created_idx ON meals (user_id, created_at DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ApiError::EmailTaken.into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| user_from_row(&row));

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| user_from_row(&row));

        Ok(user)
    }

    pub async fn add_meal(&self, meal: &Meal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meals (
                id, user_id, image_path, image_url, comments, calories,
                description, breakdown, confidence_score, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(meal.id)
        .bind(meal.user_id)
        .bind(&meal.image_path)
        .bind(&meal.image_url)
        .bind(&meal.comments)
        .bind(meal.calories)
        .bind(&meal.description)
        .bind(&meal.breakdown)
        .bind(meal.confidence_score)
        .bind(meal.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_meal(&self, user_id: Uuid, meal_id: Uuid) -> Result<Option<Meal>> {
        let meal = sqlx::query(
            r#"
            SELECT id, user_id, image_path, image_url, comments, calories,
                   description, breakdown, confidence_score, created_at
            FROM meals
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(meal_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| meal_from_row(&row));

        Ok(meal)
    }

    pub async fn get_meal_history(&self, user_id: Uuid, limit: i64) -> Result<Vec<Meal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, image_path, image_url, comments, calories,
                   description, breakdown, confidence_score, created_at
            FROM meals
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(meal_from_row).collect())
    }

    /// Returns false when no meal with that id belongs to the user
    pub async fn delete_meal(&self, user_id: Uuid, meal_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
            .bind(meal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_meal_stats(&self, user_id: Uuid, today: NaiveDate) -> Result<MealStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_meals,
                COALESCE(SUM(calories), 0.0) AS total_calories,
                COALESCE(AVG(calories), 0.0) AS average_calories,
                COUNT(*) FILTER (
                    WHERE created_at >= $2::DATE
                        AND created_at < ($2::DATE + INTERVAL '1 day')
                ) AS today_meals,
                COALESCE(SUM(calories) FILTER (
                    WHERE created_at >= $2::DATE
                        AND created_at < ($2::DATE + INTERVAL '1 day')
                ), 0.0) AS today_calories
            FROM meals
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(MealStats {
            total_meals: row.get(0),
            total_calories: row.get(1),
            average_calories: row.get(2),
            today_meals: row.get(3),
            today_calories: row.get(4),
        })
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get(0),
        email: row.get(1),
        name: row.get(2),
        password_hash: row.get(3),
        created_at: row.get(4),
    }
}

fn meal_from_row(row: &PgRow) -> Meal {
    Meal {
        id: row.get(0),
        user_id: row.get(1),
        image_path: row.get(2),
        image_url: row.get(3),
        comments: row.get(4),
        calories: row.get(5),
        description: row.get(6),
        breakdown: row.get(7),
        confidence_score: row.get(8),
        created_at: row.get(9),
    }
}
