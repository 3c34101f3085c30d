//! # Inventory Repository
//!
//! Recipe-driven stock deduction for sold dishes.
//!
//! ## Deduction
//! ```text
//! dish × quantity
//!    │
//!    ▼
//! dish_ingredients (recipe)      e.g. tacos: tortilla 3, beef 120g
//!    │
//!    ├── ingredients.stock_quantity -= recipe.quantity × quantity
//!    │     (CHECK stock_quantity >= 0 rejects overselling)
//!    │
//!    └── inventory_movements row per ingredient (negative quantity)
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct RecipeLine {
    ingredient_id: String,
    quantity: i64,
}

/// Repository for dishes, ingredients and stock movements.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Deducts the recipe of `dish_id` × `quantity` from stock.
    ///
    /// Returns the number of ingredients touched. Dishes without a recipe
    /// deduct nothing.
    ///
    /// ## Errors
    /// * `DbError::CheckViolation` - an ingredient would go below zero
    pub async fn deduct_for_dish(
        &self,
        conn: &mut SqliteConnection,
        dish_id: &str,
        quantity: i64,
        actor_id: &str,
        ticket_id: &str,
    ) -> DbResult<usize> {
        let recipe = sqlx::query_as::<_, RecipeLine>(
            "SELECT ingredient_id, quantity FROM dish_ingredients WHERE dish_id = ?1 ORDER BY ingredient_id",
        )
        .bind(dish_id)
        .fetch_all(&mut *conn)
        .await?;

        let now = Utc::now();
        for line in &recipe {
            let used = line.quantity * quantity;

            let result = sqlx::query(
                "UPDATE ingredients SET stock_quantity = stock_quantity - ?1 WHERE id = ?2",
            )
            .bind(used)
            .bind(&line.ingredient_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Ingredient", &line.ingredient_id));
            }

            sqlx::query(
                r#"
                INSERT INTO inventory_movements (id, ingredient_id, quantity, reason, ticket_id, actor_id, created_at)
                VALUES (?1, ?2, ?3, 'ticket_sale', ?4, ?5, ?6)
                "#,
            )
            .bind(mesa_core::new_id())
            .bind(&line.ingredient_id)
            .bind(-used)
            .bind(ticket_id)
            .bind(actor_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }

        debug!(
            dish_id = %dish_id,
            quantity = quantity,
            ingredients = recipe.len(),
            "Deducted stock for dish"
        );
        Ok(recipe.len())
    }

    /// Current stock of an ingredient.
    pub async fn stock_of(&self, ingredient_id: &str) -> DbResult<i64> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM ingredients WHERE id = ?1")
                .bind(ingredient_id)
                .fetch_optional(&self.pool)
                .await?;
        stock.ok_or_else(|| DbError::not_found("Ingredient", ingredient_id))
    }

    /// Number of stock movements recorded against a ticket.
    pub async fn movements_for_ticket(&self, ticket_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements WHERE ticket_id = ?1")
                .bind(ticket_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Catalog setup (seeding and tests)
    // -------------------------------------------------------------------------

    pub async fn insert_dish(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        name: &str,
        price_cents: i64,
    ) -> DbResult<()> {
        sqlx::query("INSERT INTO dishes (id, name, price_cents) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(price_cents)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn insert_ingredient(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        name: &str,
        unit: &str,
        stock_quantity: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO ingredients (id, name, unit, stock_quantity) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(name)
        .bind(unit)
        .bind(stock_quantity)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn add_recipe_line(
        &self,
        conn: &mut SqliteConnection,
        dish_id: &str,
        ingredient_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO dish_ingredients (dish_id, ingredient_id, quantity) VALUES (?1, ?2, ?3)",
        )
        .bind(dish_id)
        .bind(ingredient_id)
        .bind(quantity)
        .execute(conn)
        .await?;
        Ok(())
    }
}
