use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::hpp::models::{ChangeSeverity, HppAlert, HppBreakdown, HppRecord};
use crate::hpp::calculator::round_money;
use crate::sqlite::SqliteDatabase;

use super::models::{
    Ingredient, IngredientUpdate, NewIngredient, NewRecipe, Purchase, Recipe, RecipeLine,
    StockTransaction, StockTransactionKind,
};
use super::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CatalogSummary {
    pub ingredients: usize,
    pub active_recipes: usize,
    pub low_stock: usize,
    pub stock_value: f64,
}

/// Recipe line joined with its ingredient; `None` when the ingredient row is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeMaterial {
    pub line: RecipeLine,
    pub ingredient: Option<Ingredient>,
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    db: SqliteDatabase,
}

impl SqliteCatalogStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    fn open(&self) -> CatalogResult<Connection> {
        Ok(self.db.open()?)
    }

    pub fn add_ingredient(&self, input: &NewIngredient) -> CatalogResult<Ingredient> {
        input.validate()?;
        let id = format!("ing-{}", Uuid::new_v4().simple());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO ingredients (id, name, category, unit, price_per_unit, current_stock, min_stock)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                input.name.trim(),
                input.category.trim(),
                input.unit.trim(),
                input.price_per_unit,
                input.current_stock,
                input.min_stock,
            ],
        )?;
        debug!(ingredient_id = %id, name = %input.name, "ingredient created");
        self.require_ingredient(&conn, &id)
    }

    pub fn update_ingredient(
        &self,
        ingredient_id: &str,
        update: &IngredientUpdate,
    ) -> CatalogResult<Ingredient> {
        update.validate()?;
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE ingredients
             SET name = COALESCE(?2, name),
                 category = COALESCE(?3, category),
                 unit = COALESCE(?4, unit),
                 price_per_unit = COALESCE(?5, price_per_unit),
                 min_stock = COALESCE(?6, min_stock),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![
                ingredient_id,
                update.name.as_deref().map(str::trim),
                update.category.as_deref().map(str::trim),
                update.unit.as_deref().map(str::trim),
                update.price_per_unit,
                update.min_stock,
            ],
        )?;
        if affected == 0 {
            return Err(CatalogError::IngredientNotFound {
                ingredient_id: ingredient_id.to_string(),
            });
        }
        self.require_ingredient(&conn, ingredient_id)
    }

    pub fn fetch_ingredient(&self, ingredient_id: &str) -> CatalogResult<Option<Ingredient>> {
        let conn = self.open()?;
        Ok(fetch_ingredient(&conn, ingredient_id)?)
    }

    pub fn list_ingredients(&self, include_inactive: bool) -> CatalogResult<Vec<Ingredient>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM ingredients
             WHERE (?1 OR is_active = 1)
             ORDER BY name COLLATE NOCASE ASC",
        )?;
        let rows = stmt
            .query_map([include_inactive], |row| Ingredient::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn deactivate_ingredient(&self, ingredient_id: &str) -> CatalogResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE ingredients SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            [ingredient_id],
        )?;
        if affected == 0 {
            return Err(CatalogError::IngredientNotFound {
                ingredient_id: ingredient_id.to_string(),
            });
        }
        Ok(())
    }

    /// Hard delete. Fails with a database error while a recipe still uses the ingredient.
    pub fn delete_ingredient(&self, ingredient_id: &str) -> CatalogResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("DELETE FROM ingredients WHERE id = ?1", [ingredient_id])?;
        if affected == 0 {
            return Err(CatalogError::IngredientNotFound {
                ingredient_id: ingredient_id.to_string(),
            });
        }
        Ok(())
    }

    /// Books a purchase: stock goes up, the list price follows the purchase price and the
    /// weighted average cost is moved over the stock on hand.
    pub fn record_purchase(&self, purchase: &Purchase) -> CatalogResult<StockTransaction> {
        purchase.validate()?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let transaction = apply_purchase(&tx, purchase)?;
        tx.commit()?;
        Ok(transaction)
    }

    pub fn record_usage(
        &self,
        ingredient_id: &str,
        quantity: f64,
        reference: Option<&str>,
        note: Option<&str>,
    ) -> CatalogResult<StockTransaction> {
        crate::validation::positive("quantity", quantity)?;
        crate::validation::optional_text("note", note, crate::validation::MAX_NOTE_LEN)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let transaction = apply_usage(&tx, ingredient_id, quantity, reference, note)?;
        tx.commit()?;
        Ok(transaction)
    }

    /// Stock opname: sets the counted stock and books the difference as an adjustment.
    pub fn adjust_stock(
        &self,
        ingredient_id: &str,
        counted_stock: f64,
        note: Option<&str>,
    ) -> CatalogResult<StockTransaction> {
        crate::validation::non_negative("counted_stock", counted_stock)?;
        crate::validation::optional_text("note", note, crate::validation::MAX_NOTE_LEN)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let ingredient = require_ingredient_row(&tx, ingredient_id)?;
        let delta = counted_stock - ingredient.current_stock;
        tx.execute(
            "UPDATE ingredients SET current_stock = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![ingredient_id, counted_stock],
        )?;
        let id = insert_transaction(
            &tx,
            ingredient_id,
            StockTransactionKind::Adjustment,
            delta,
            None,
            None,
            note,
        )?;
        let transaction = fetch_transaction(&tx, id)?;
        tx.commit()?;
        Ok(transaction)
    }

    /// Deducts every recipe line times `batches` in one transaction.
    pub fn consume_recipe(
        &self,
        recipe_id: &str,
        batches: f64,
        reference: Option<&str>,
    ) -> CatalogResult<Vec<StockTransaction>> {
        crate::validation::positive("batches", batches)?;
        let mut conn = self.open()?;
        let lines = load_lines(&conn, recipe_id)?;
        if fetch_recipe_row(&conn, recipe_id)?.is_none() {
            return Err(CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            });
        }
        let tx = conn.transaction()?;
        let note = format!("produksi {batches} batch resep {recipe_id}");
        let mut booked = Vec::with_capacity(lines.len());
        for line in &lines {
            let quantity = line.quantity * batches;
            if quantity <= 0.0 {
                continue;
            }
            booked.push(apply_usage(
                &tx,
                &line.ingredient_id,
                quantity,
                reference,
                Some(note.as_str()),
            )?);
        }
        tx.commit()?;
        info!(recipe_id, batches, lines = booked.len(), "recipe consumed from stock");
        Ok(booked)
    }

    pub fn transactions(
        &self,
        ingredient_id: &str,
        limit: usize,
    ) -> CatalogResult<Vec<StockTransaction>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM stock_transactions
             WHERE ingredient_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![ingredient_id, limit as i64], |row| {
                StockTransaction::from_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn add_recipe(&self, input: &NewRecipe) -> CatalogResult<Recipe> {
        input.validate()?;
        let id = format!("rcp-{}", Uuid::new_v4().simple());
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO recipes (id, name, category, servings, prep_time_minutes, cook_time_minutes, selling_price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                input.name.trim(),
                input.category.trim(),
                input.servings,
                input.prep_time_minutes,
                input.cook_time_minutes,
                input.selling_price,
            ],
        )?;
        for (position, line) in input.lines.iter().enumerate() {
            if fetch_ingredient(&tx, &line.ingredient_id)?.is_none() {
                return Err(CatalogError::IngredientNotFound {
                    ingredient_id: line.ingredient_id.clone(),
                });
            }
            tx.execute(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(recipe_id, ingredient_id) DO UPDATE SET
                     quantity = quantity + excluded.quantity",
                params![id, line.ingredient_id, line.quantity, line.unit.trim(), position as i64],
            )?;
        }
        tx.commit()?;
        info!(recipe_id = %id, name = %input.name, lines = input.lines.len(), "recipe created");
        self.fetch_recipe(&id)?
            .ok_or(CatalogError::RecipeNotFound { recipe_id: id })
    }

    pub fn fetch_recipe(&self, recipe_id: &str) -> CatalogResult<Option<Recipe>> {
        let conn = self.open()?;
        let Some(mut recipe) = fetch_recipe_row(&conn, recipe_id)? else {
            return Ok(None);
        };
        recipe.lines = load_lines(&conn, recipe_id)?;
        Ok(Some(recipe))
    }

    pub fn list_recipes(&self, include_inactive: bool) -> CatalogResult<Vec<Recipe>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM recipes
             WHERE (?1 OR is_active = 1)
             ORDER BY name COLLATE NOCASE ASC",
        )?;
        let mut recipes = stmt
            .query_map([include_inactive], |row| Recipe::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        for recipe in recipes.iter_mut() {
            recipe.lines = load_lines(&conn, &recipe.id)?;
        }
        Ok(recipes)
    }

    /// Recipe lines joined with their ingredients, in recipe order.
    pub fn recipe_materials(&self, recipe_id: &str) -> CatalogResult<Vec<RecipeMaterial>> {
        let conn = self.open()?;
        let lines = load_lines(&conn, recipe_id)?;
        let mut materials = Vec::with_capacity(lines.len());
        for line in lines {
            let ingredient = fetch_ingredient(&conn, &line.ingredient_id)?;
            materials.push(RecipeMaterial { line, ingredient });
        }
        Ok(materials)
    }

    pub fn set_selling_price(&self, recipe_id: &str, price: Option<f64>) -> CatalogResult<()> {
        if let Some(price) = price {
            crate::validation::non_negative("selling_price", price)?;
        }
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE recipes SET selling_price = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![recipe_id, price],
        )?;
        if affected == 0 {
            return Err(CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn deactivate_recipe(&self, recipe_id: &str) -> CatalogResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE recipes SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            [recipe_id],
        )?;
        if affected == 0 {
            return Err(CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_recipe(&self, recipe_id: &str) -> CatalogResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("DELETE FROM recipes WHERE id = ?1", [recipe_id])?;
        if affected == 0 {
            return Err(CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            });
        }
        Ok(())
    }

    /// Persists an HPP run and stamps the recipe with the new per-unit cost.
    pub fn save_hpp(&self, breakdown: &HppBreakdown) -> CatalogResult<HppRecord> {
        let materials = serde_json::to_string(&breakdown.materials)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO hpp_calculations (
                recipe_id, material_cost, labor_cost, overhead_cost, total_hpp,
                cost_per_unit, servings, breakdown, calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                breakdown.recipe_id,
                breakdown.material_cost,
                breakdown.labor_cost,
                breakdown.overhead_cost,
                breakdown.total_hpp,
                breakdown.cost_per_unit,
                breakdown.servings,
                materials,
                Utc::now().naive_utc(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        let affected = tx.execute(
            "UPDATE recipes SET cost_per_unit = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![breakdown.recipe_id, breakdown.cost_per_unit],
        )?;
        if affected == 0 {
            return Err(CatalogError::RecipeNotFound {
                recipe_id: breakdown.recipe_id.clone(),
            });
        }
        let record = tx.query_row(
            "SELECT * FROM hpp_calculations WHERE id = ?1",
            [id],
            |row| HppRecord::from_row(row),
        )?;
        tx.commit()?;
        Ok(record)
    }

    pub fn latest_hpp(&self, recipe_id: &str) -> CatalogResult<Option<HppRecord>> {
        Ok(self.hpp_history(recipe_id, 1)?.into_iter().next())
    }

    pub fn hpp_history(&self, recipe_id: &str, limit: usize) -> CatalogResult<Vec<HppRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM hpp_calculations
             WHERE recipe_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![recipe_id, limit as i64], |row| HppRecord::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn record_hpp_alert(
        &self,
        recipe_id: &str,
        previous_cost: f64,
        new_cost: f64,
        change_percent: f64,
        severity: ChangeSeverity,
    ) -> CatalogResult<HppAlert> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO hpp_alerts (recipe_id, previous_cost, new_cost, change_percent, severity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![recipe_id, previous_cost, new_cost, change_percent, severity.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        let alert = conn.query_row("SELECT * FROM hpp_alerts WHERE id = ?1", [id], |row| {
            HppAlert::from_row(row)
        })?;
        Ok(alert)
    }

    pub fn hpp_alerts(&self, limit: usize) -> CatalogResult<Vec<HppAlert>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM hpp_alerts ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt
            .query_map([limit as i64], |row| HppAlert::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn summary(&self) -> CatalogResult<CatalogSummary> {
        let ingredients = self.list_ingredients(false)?;
        let conn = self.open()?;
        let active_recipes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(CatalogSummary {
            ingredients: ingredients.len(),
            active_recipes: active_recipes as usize,
            low_stock: ingredients
                .iter()
                .filter(|ing| ing.min_stock > 0.0 && ing.current_stock <= ing.min_stock)
                .count(),
            stock_value: ingredients.iter().map(Ingredient::stock_value).sum(),
        })
    }

    fn require_ingredient(&self, conn: &Connection, ingredient_id: &str) -> CatalogResult<Ingredient> {
        require_ingredient_row(conn, ingredient_id)
    }
}

pub(crate) fn apply_purchase(conn: &Connection, purchase: &Purchase) -> CatalogResult<StockTransaction> {
    let ingredient = require_ingredient_row(conn, &purchase.ingredient_id)?;
    let on_hand = ingredient.current_stock.max(0.0);
    let previous_cost = ingredient
        .weighted_average_cost
        .unwrap_or(ingredient.price_per_unit);
    let new_stock = ingredient.current_stock + purchase.quantity;
    let weighted_average = if on_hand > 0.0 {
        (on_hand * previous_cost + purchase.quantity * purchase.unit_price)
            / (on_hand + purchase.quantity)
    } else {
        purchase.unit_price
    };
    conn.execute(
        "UPDATE ingredients
         SET current_stock = ?2,
             price_per_unit = ?3,
             weighted_average_cost = ?4,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![
            purchase.ingredient_id,
            new_stock,
            purchase.unit_price,
            round_money(weighted_average),
        ],
    )?;
    let id = insert_transaction(
        conn,
        &purchase.ingredient_id,
        StockTransactionKind::Purchase,
        purchase.quantity,
        Some(purchase.unit_price),
        purchase.reference.as_deref(),
        purchase.note.as_deref(),
    )?;
    debug!(
        ingredient_id = %purchase.ingredient_id,
        quantity = purchase.quantity,
        weighted_average,
        "purchase recorded"
    );
    fetch_transaction(conn, id)
}

fn apply_usage(
    conn: &Connection,
    ingredient_id: &str,
    quantity: f64,
    reference: Option<&str>,
    note: Option<&str>,
) -> CatalogResult<StockTransaction> {
    let ingredient = require_ingredient_row(conn, ingredient_id)?;
    if ingredient.current_stock < quantity {
        return Err(CatalogError::InsufficientStock {
            ingredient_id: ingredient_id.to_string(),
            available: ingredient.current_stock,
            requested: quantity,
        });
    }
    conn.execute(
        "UPDATE ingredients
         SET current_stock = current_stock - ?2, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![ingredient_id, quantity],
    )?;
    let unit_cost = ingredient
        .weighted_average_cost
        .unwrap_or(ingredient.price_per_unit);
    let id = insert_transaction(
        conn,
        ingredient_id,
        StockTransactionKind::Usage,
        -quantity,
        Some(unit_cost),
        reference,
        note,
    )?;
    fetch_transaction(conn, id)
}

fn insert_transaction(
    conn: &Connection,
    ingredient_id: &str,
    kind: StockTransactionKind,
    quantity: f64,
    unit_price: Option<f64>,
    reference: Option<&str>,
    note: Option<&str>,
) -> CatalogResult<i64> {
    let total_price = unit_price.map(|price| round_money(price * quantity.abs()));
    conn.execute(
        "INSERT INTO stock_transactions (ingredient_id, kind, quantity, unit_price, total_price, reference, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ingredient_id,
            kind.as_str(),
            quantity,
            unit_price,
            total_price,
            reference,
            note,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn fetch_transaction(conn: &Connection, id: i64) -> CatalogResult<StockTransaction> {
    Ok(conn.query_row(
        "SELECT * FROM stock_transactions WHERE id = ?1",
        [id],
        |row| StockTransaction::from_row(row),
    )?)
}

fn fetch_ingredient(conn: &Connection, ingredient_id: &str) -> rusqlite::Result<Option<Ingredient>> {
    conn.query_row(
        "SELECT * FROM ingredients WHERE id = ?1",
        [ingredient_id],
        |row| Ingredient::from_row(row),
    )
    .optional()
}

fn require_ingredient_row(conn: &Connection, ingredient_id: &str) -> CatalogResult<Ingredient> {
    fetch_ingredient(conn, ingredient_id)?.ok_or_else(|| CatalogError::IngredientNotFound {
        ingredient_id: ingredient_id.to_string(),
    })
}

fn fetch_recipe_row(conn: &Connection, recipe_id: &str) -> rusqlite::Result<Option<Recipe>> {
    conn.query_row("SELECT * FROM recipes WHERE id = ?1", [recipe_id], |row| {
        Recipe::from_row(row)
    })
    .optional()
}

fn load_lines(conn: &Connection, recipe_id: &str) -> rusqlite::Result<Vec<RecipeLine>> {
    let mut stmt = conn.prepare(
        "SELECT ingredient_id, quantity, unit FROM recipe_ingredients
         WHERE recipe_id = ?1
         ORDER BY position ASC",
    )?;
    let rows = stmt
        .query_map([recipe_id], |row| {
            Ok(RecipeLine {
                ingredient_id: row.get(0)?,
                quantity: row.get(1)?,
                unit: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
