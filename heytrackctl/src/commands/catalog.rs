use clap::{ArgAction, Args, Subcommand};
use heytrack_core::hpp::HppRecord;
use heytrack_core::{
    CatalogError, Ingredient, NewIngredient, NewRecipe, Purchase, Recipe, RecipeLine,
    StockTransaction,
};
use serde::Serialize;

use crate::{render, rupiah, AppContext, DisplayFallback, OutputFormat, Result};

#[derive(Subcommand, Debug)]
pub enum IngredientCommands {
    /// Registers a new ingredient
    Add(IngredientAddArgs),
    /// Lists ingredients
    List(IngredientListArgs),
    /// Shows an ingredient with its latest stock movements
    Show(IngredientShowArgs),
    /// Books a purchase (stock in)
    Purchase(PurchaseArgs),
    /// Books usage (stock out)
    Use(UsageArgs),
    /// Stock opname: sets the counted stock
    Adjust(AdjustArgs),
    /// Hides an ingredient from lists and reorder checks
    Deactivate(IdArgs),
}

#[derive(Args, Debug)]
pub struct IngredientAddArgs {
    pub name: String,
    /// Stock unit (kg, liter, pcs, ...)
    #[arg(long)]
    pub unit: String,
    /// Price per unit
    #[arg(long)]
    pub price: f64,
    #[arg(long, default_value = "lainnya")]
    pub category: String,
    /// Opening stock
    #[arg(long, default_value_t = 0.0)]
    pub stock: f64,
    /// Minimum stock before a reorder is suggested (0 = untracked)
    #[arg(long, default_value_t = 0.0)]
    pub min_stock: f64,
}

#[derive(Args, Debug)]
pub struct IngredientListArgs {
    /// Include deactivated ingredients
    #[arg(long)]
    pub all: bool,
    /// Only ingredients at or below their minimum stock
    #[arg(long)]
    pub low: bool,
}

#[derive(Args, Debug)]
pub struct IngredientShowArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    /// Number of stock movements shown
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct PurchaseArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    #[arg(long)]
    pub quantity: f64,
    /// Price paid per unit
    #[arg(long)]
    pub price: f64,
    /// Invoice or PO number
    #[arg(long)]
    pub reference: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct UsageArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    #[arg(long)]
    pub quantity: f64,
    #[arg(long)]
    pub reference: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct AdjustArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    /// Physically counted stock
    #[arg(long)]
    pub counted: f64,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum RecipeCommands {
    /// Creates a recipe from ingredient lines
    Add(RecipeAddArgs),
    /// Lists recipes
    List(RecipeListArgs),
    /// Shows a recipe with its lines and latest HPP
    Show(IdArgs),
    /// Deducts the ingredients of one or more batches from stock
    Produce(ProduceArgs),
    /// Sets or clears the selling price
    SetPrice(SetPriceArgs),
    /// Hides a recipe from lists and HPP refresh
    Deactivate(IdArgs),
}

#[derive(Args, Debug)]
pub struct RecipeAddArgs {
    pub name: String,
    /// Units produced per batch
    #[arg(long, default_value_t = 1)]
    pub servings: i64,
    #[arg(long, default_value = "umum")]
    pub category: String,
    #[arg(long, default_value_t = 0)]
    pub prep_minutes: i64,
    #[arg(long, default_value_t = 0)]
    pub cook_minutes: i64,
    #[arg(long)]
    pub selling_price: Option<f64>,
    /// Ingredient line, repeat for each (unit defaults to the ingredient's unit)
    #[arg(
        long = "line",
        action = ArgAction::Append,
        value_parser = parse_line,
        value_name = "INGREDIENT=QTY[:UNIT]",
        required = true
    )]
    pub lines: Vec<LineSpec>,
}

#[derive(Args, Debug)]
pub struct RecipeListArgs {
    /// Include deactivated recipes
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    #[arg(long, default_value_t = 1.0)]
    pub batches: f64,
    /// Production batch reference
    #[arg(long)]
    pub reference: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetPriceArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    /// New selling price; omit to clear
    #[arg(long)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSpec {
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit: Option<String>,
}

fn parse_line(value: &str) -> std::result::Result<LineSpec, String> {
    let (ingredient_id, rest) = value
        .split_once('=')
        .ok_or_else(|| "use the form <ingredient>=<qty>[:<unit>]".to_string())?;
    let ingredient_id = ingredient_id.trim();
    if ingredient_id.is_empty() {
        return Err("ingredient id must not be empty".to_string());
    }
    let (quantity, unit) = match rest.split_once(':') {
        Some((quantity, unit)) if !unit.trim().is_empty() => {
            (quantity, Some(unit.trim().to_string()))
        }
        Some(_) => return Err("unit after ':' must not be empty".to_string()),
        None => (rest, None),
    };
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|err| format!("invalid quantity {quantity:?}: {err}"))?;
    Ok(LineSpec {
        ingredient_id: ingredient_id.to_string(),
        quantity,
        unit,
    })
}

pub fn run_ingredient(
    context: &AppContext,
    command: &IngredientCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        IngredientCommands::Add(args) => render(&context.ingredient_add(args)?, format),
        IngredientCommands::List(args) => render(&context.ingredient_list(args)?, format),
        IngredientCommands::Show(args) => render(&context.ingredient_show(args)?, format),
        IngredientCommands::Purchase(args) => {
            let purchase = Purchase {
                ingredient_id: args.id.clone(),
                quantity: args.quantity,
                unit_price: args.price,
                reference: args.reference.clone(),
                note: args.note.clone(),
            };
            let transaction = context.catalog().record_purchase(&purchase)?;
            render(&transaction, format)
        }
        IngredientCommands::Use(args) => {
            let transaction = context.catalog().record_usage(
                &args.id,
                args.quantity,
                args.reference.as_deref(),
                args.note.as_deref(),
            )?;
            render(&transaction, format)
        }
        IngredientCommands::Adjust(args) => {
            let transaction =
                context
                    .catalog()
                    .adjust_stock(&args.id, args.counted, args.note.as_deref())?;
            render(&transaction, format)
        }
        IngredientCommands::Deactivate(args) => {
            let catalog = context.catalog();
            catalog.deactivate_ingredient(&args.id)?;
            render(&context.require_ingredient(&args.id)?, format)
        }
    }
}

pub fn run_recipe(context: &AppContext, command: &RecipeCommands, format: OutputFormat) -> Result<()> {
    match command {
        RecipeCommands::Add(args) => render(&context.recipe_add(args)?, format),
        RecipeCommands::List(args) => {
            let recipes = RecipeList {
                rows: context.catalog().list_recipes(args.all)?,
            };
            render(&recipes, format)
        }
        RecipeCommands::Show(args) => render(&context.recipe_show(&args.id)?, format),
        RecipeCommands::Produce(args) => render(&context.recipe_produce(args)?, format),
        RecipeCommands::SetPrice(args) => {
            context.catalog().set_selling_price(&args.id, args.price)?;
            render(&context.require_recipe(&args.id)?, format)
        }
        RecipeCommands::Deactivate(args) => {
            context.catalog().deactivate_recipe(&args.id)?;
            render(&context.require_recipe(&args.id)?, format)
        }
    }
}

impl AppContext {
    pub fn require_ingredient(&self, ingredient_id: &str) -> Result<Ingredient> {
        self.catalog()
            .fetch_ingredient(ingredient_id)?
            .ok_or_else(|| {
                CatalogError::IngredientNotFound {
                    ingredient_id: ingredient_id.to_string(),
                }
                .into()
            })
    }

    pub fn require_recipe(&self, recipe_id: &str) -> Result<Recipe> {
        self.catalog().fetch_recipe(recipe_id)?.ok_or_else(|| {
            CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            }
            .into()
        })
    }

    pub fn ingredient_add(&self, args: &IngredientAddArgs) -> Result<Ingredient> {
        let mut input = NewIngredient::new(&args.name, &args.unit, args.price);
        input.category = args.category.clone();
        input.current_stock = args.stock;
        input.min_stock = args.min_stock;
        Ok(self.catalog().add_ingredient(&input)?)
    }

    pub fn ingredient_list(&self, args: &IngredientListArgs) -> Result<IngredientList> {
        let rows = self
            .catalog()
            .list_ingredients(args.all)?
            .into_iter()
            .filter(|ingredient| {
                !args.low || (ingredient.min_stock > 0.0 && ingredient.current_stock <= ingredient.min_stock)
            })
            .collect();
        Ok(IngredientList { rows })
    }

    pub fn ingredient_show(&self, args: &IngredientShowArgs) -> Result<IngredientDetail> {
        let ingredient = self.require_ingredient(&args.id)?;
        let transactions = self.catalog().transactions(&args.id, args.limit)?;
        Ok(IngredientDetail {
            ingredient,
            transactions,
        })
    }

    pub fn recipe_add(&self, args: &RecipeAddArgs) -> Result<Recipe> {
        let mut lines = Vec::with_capacity(args.lines.len());
        for spec in &args.lines {
            let unit = match &spec.unit {
                Some(unit) => unit.clone(),
                None => self.require_ingredient(&spec.ingredient_id)?.unit,
            };
            lines.push(RecipeLine::new(&spec.ingredient_id, spec.quantity, unit));
        }
        let input = NewRecipe {
            name: args.name.clone(),
            category: args.category.clone(),
            servings: args.servings,
            prep_time_minutes: args.prep_minutes,
            cook_time_minutes: args.cook_minutes,
            selling_price: args.selling_price,
            lines,
        };
        Ok(self.catalog().add_recipe(&input)?)
    }

    pub fn recipe_show(&self, recipe_id: &str) -> Result<RecipeDetail> {
        let recipe = self.require_recipe(recipe_id)?;
        let latest_hpp = self.catalog().latest_hpp(recipe_id)?;
        Ok(RecipeDetail { recipe, latest_hpp })
    }

    pub fn recipe_produce(&self, args: &ProduceArgs) -> Result<ProductionReport> {
        let transactions =
            self.catalog()
                .consume_recipe(&args.id, args.batches, args.reference.as_deref())?;
        Ok(ProductionReport {
            recipe_id: args.id.clone(),
            batches: args.batches,
            transactions,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientList {
    pub rows: Vec<Ingredient>,
}

#[derive(Debug, Serialize)]
pub struct IngredientDetail {
    pub ingredient: Ingredient,
    pub transactions: Vec<StockTransaction>,
}

#[derive(Debug, Serialize)]
pub struct RecipeList {
    pub rows: Vec<Recipe>,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_hpp: Option<HppRecord>,
}

#[derive(Debug, Serialize)]
pub struct ProductionReport {
    pub recipe_id: String,
    pub batches: f64,
    pub transactions: Vec<StockTransaction>,
}

fn ingredient_line(ingredient: &Ingredient) -> String {
    let mut flags = Vec::new();
    if ingredient.min_stock > 0.0 && ingredient.current_stock <= ingredient.min_stock {
        flags.push("LOW");
    }
    if !ingredient.is_active {
        flags.push("inactive");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "{} | {} | stock={} {} (min {}) | {}/{}{}",
        ingredient.id,
        ingredient.name,
        ingredient.current_stock,
        ingredient.unit,
        ingredient.min_stock,
        rupiah(ingredient.price_per_unit),
        ingredient.unit,
        flags
    )
}

fn transaction_line(transaction: &StockTransaction) -> String {
    let price = transaction
        .unit_price
        .map(|price| format!(" @ {}", rupiah(price)))
        .unwrap_or_default();
    let reference = transaction
        .reference
        .as_deref()
        .map(|reference| format!(" ref={reference}"))
        .unwrap_or_default();
    format!(
        "#{} {} {:+}{}{}",
        transaction.id, transaction.kind, transaction.quantity, price, reference
    )
}

fn recipe_line(recipe: &Recipe) -> String {
    let cost = recipe
        .cost_per_unit
        .map(rupiah)
        .unwrap_or_else(|| "-".to_string());
    let price = recipe
        .selling_price
        .map(rupiah)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | {} | servings={} | hpp/unit={} | price={}{}",
        recipe.id,
        recipe.name,
        recipe.servings,
        cost,
        price,
        if recipe.is_active { "" } else { " [inactive]" }
    )
}

impl DisplayFallback for Ingredient {
    fn display(&self) -> String {
        ingredient_line(self)
    }
}

impl DisplayFallback for IngredientList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No ingredients found".to_string();
        }
        self.rows
            .iter()
            .map(ingredient_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for IngredientDetail {
    fn display(&self) -> String {
        let mut lines = vec![ingredient_line(&self.ingredient)];
        if let Some(wac) = self.ingredient.weighted_average_cost {
            lines.push(format!("Weighted average cost: {}", rupiah(wac)));
        }
        lines.push(format!("Stock value: {}", rupiah(self.ingredient.stock_value())));
        if self.transactions.is_empty() {
            lines.push("No stock movements".to_string());
        } else {
            lines.push("Movements:".to_string());
            for transaction in &self.transactions {
                lines.push(format!("  {}", transaction_line(transaction)));
            }
        }
        lines.join("\n")
    }
}

impl DisplayFallback for StockTransaction {
    fn display(&self) -> String {
        format!("{} on {}", transaction_line(self), self.ingredient_id)
    }
}

impl DisplayFallback for Recipe {
    fn display(&self) -> String {
        recipe_line(self)
    }
}

impl DisplayFallback for RecipeList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No recipes found".to_string();
        }
        self.rows.iter().map(recipe_line).collect::<Vec<_>>().join("\n")
    }
}

impl DisplayFallback for RecipeDetail {
    fn display(&self) -> String {
        let mut lines = vec![recipe_line(&self.recipe)];
        for line in &self.recipe.lines {
            lines.push(format!(
                "  - {} {} {}",
                line.ingredient_id, line.quantity, line.unit
            ));
        }
        match &self.latest_hpp {
            Some(record) => lines.push(format!(
                "Latest HPP: {} total, {} per unit",
                rupiah(record.total_hpp),
                rupiah(record.cost_per_unit)
            )),
            None => lines.push("Latest HPP: not calculated yet".to_string()),
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ProductionReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Produced {} batch(es) of {}",
            self.batches, self.recipe_id
        )];
        for transaction in &self.transactions {
            lines.push(format!("  {}", transaction.display()));
        }
        lines.join("\n")
    }
}
