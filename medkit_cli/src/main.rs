use clap::{Parser, Subcommand};
use medkit_core::export::{export_shopping_list, export_usage_logs};
use medkit_core::usage_log::group_by_day;
use medkit_core::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medkit")]
#[command(about = "Personal medicine inventory tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Admin username
    #[arg(long, global = true, env = "MEDKIT_USERNAME")]
    username: Option<String>,

    /// Admin password
    #[arg(long, global = true, env = "MEDKIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List all medicines
    List {
        /// Only medicines in this category (name or id)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one medicine with its recent doses
    Show { id: String },

    /// Add a medicine
    Add {
        #[arg(long)]
        name: String,

        /// Category name or id
        #[arg(long)]
        category: String,

        #[arg(long)]
        dosage: String,

        #[arg(long)]
        quantity: u32,

        /// Quantity a restock resets to
        #[arg(long, default_value_t = DEFAULT_RESTOCK_QUANTITY)]
        default_quantity: u32,

        /// Symptom treated (repeatable)
        #[arg(long = "symptom")]
        symptoms: Vec<String>,

        #[arg(long)]
        purpose: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Edit a medicine
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        /// Category name or id
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        dosage: Option<String>,

        #[arg(long)]
        quantity: Option<u32>,

        #[arg(long)]
        default_quantity: Option<u32>,

        /// Replace symptoms (repeatable)
        #[arg(long = "symptom", conflicts_with = "clear_symptoms")]
        symptoms: Vec<String>,

        /// Remove all symptoms
        #[arg(long)]
        clear_symptoms: bool,

        #[arg(long)]
        purpose: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a medicine (its dose history is kept)
    Remove { id: String },

    /// Take one dose of a medicine
    Take {
        id: String,

        /// Symptom being treated (repeatable); defaults to the medicine's first
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
    },

    /// Reset a medicine to its default quantity
    Restock { id: String },

    /// Restock every low-stock medicine
    RestockAll,

    /// Shopping list of low and out-of-stock medicines
    Low {
        /// Write the list to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Recently or frequently used medicines
    Quick,

    /// Find medicines for symptoms
    Search {
        #[arg(required = true)]
        symptoms: Vec<String>,
    },

    /// Dose history
    History {
        /// Only doses of this medicine
        #[arg(long)]
        medicine: Option<String>,

        /// Write the history to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Quick access, low stock and recent doses at a glance
    Dashboard,

    /// List the known symptoms
    Symptoms,

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryCommand,
    },
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// List categories
    List,
    /// Add a category
    Add { name: String },
    /// Rename a category
    Rename { id: String, name: String },
    /// Delete a category (medicines keep their category name)
    Delete { id: String },
}

fn main() -> Result<()> {
    medkit_core::logging::init();

    let cli = Cli::parse();
    let out = Output { json: cli.json };

    if let Commands::Symptoms = cli.command {
        return cmd_symptoms(&out);
    }

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    // Every inventory command runs inside an authenticated session
    let auth = Authenticator::new(InMemorySessionStore::new(), config.auth.clone());
    let session = auth
        .login(
            cli.username.as_deref().unwrap_or_default(),
            cli.password.as_deref().unwrap_or_default(),
            false,
        )
        .ok_or(Error::Unauthorized)?;
    if !auth.is_authenticated(&session.id) {
        return Err(Error::Unauthorized);
    }

    let store = Store::open(&data_dir)?;
    let inventory = Inventory::new(&store);
    let result = run(&inventory, cli.command, &out);

    auth.logout(&session.id);
    result
}

fn run(inv: &Inventory, command: Commands, out: &Output) -> Result<()> {
    match command {
        Commands::List { category } => cmd_list(inv, category, out),
        Commands::Show { id } => cmd_show(inv, &id, out),
        Commands::Add {
            name,
            category,
            dosage,
            quantity,
            default_quantity,
            symptoms,
            purpose,
            notes,
        } => {
            let category = resolve_category(inv, &category)?;
            let medicine = inv.medicines.create(NewMedicine {
                name,
                category_id: category.id,
                category_name: category.name,
                purpose,
                usage_notes: notes,
                dosage,
                quantity,
                default_quantity,
                symptoms,
            })?;
            out.emit(&medicine, || {
                println!("✓ Added {}", medicine.name);
                println!("  id: {}", medicine.id);
            })
        }
        Commands::Edit {
            id,
            name,
            category,
            dosage,
            quantity,
            default_quantity,
            symptoms,
            clear_symptoms,
            purpose,
            notes,
        } => {
            let mut changes = MedicineUpdate {
                name,
                dosage,
                quantity,
                default_quantity,
                purpose,
                usage_notes: notes,
                ..Default::default()
            };
            if let Some(category) = category {
                let category = resolve_category(inv, &category)?;
                changes.category_id = Some(category.id);
                changes.category_name = Some(category.name);
            }
            if clear_symptoms {
                changes.symptoms = Some(Vec::new());
            } else if !symptoms.is_empty() {
                changes.symptoms = Some(symptoms);
            }

            let medicine = inv
                .medicines
                .update(&id, &changes)?
                .ok_or_else(|| Error::NotFound("Medicine not found".into()))?;
            out.emit(&medicine, || println!("✓ Updated {}", medicine.name))
        }
        Commands::Remove { id } => {
            if !inv.medicines.hard_delete(&id)? {
                return Err(Error::NotFound("Medicine not found".into()));
            }
            let policy = MedicineRepository::DELETION_POLICY;
            out.emit(
                &serde_json::json!({ "success": true, "deletion": policy }),
                || println!("✓ Medicine removed ({})", policy.label()),
            )
        }
        Commands::Take { id, symptoms } => {
            let taken = inv.take_dose(&id, &symptoms)?.ok_or_else(|| {
                Error::NotFound(
                    "Could not take dose - medicine not found or out of stock".into(),
                )
            })?;
            out.emit(&taken, || {
                println!("✓ Dose of {} logged", taken.medicine.name);
                if !taken.log.symptoms.is_empty() {
                    println!("  For: {}", taken.log.symptoms.join(", "));
                }
                println!(
                    "  {} left [{}]",
                    taken.medicine.quantity,
                    taken.medicine.stock_status().label()
                );
            })
        }
        Commands::Restock { id } => {
            let medicine = inv
                .restock(&id)?
                .ok_or_else(|| Error::NotFound("Medicine not found".into()))?;
            out.emit(&medicine, || {
                println!("✓ Restocked {} to {}", medicine.name, medicine.quantity)
            })
        }
        Commands::RestockAll => {
            let count = inv.restock_all()?;
            out.emit(
                &serde_json::json!({ "success": true, "restockedCount": count }),
                || println!("✓ Restocked {} medicines", count),
            )
        }
        Commands::Low { export } => cmd_low(inv, export, out),
        Commands::Quick => {
            let medicines = inv.medicines.quick_access()?;
            out.emit(&medicines, || {
                if medicines.is_empty() {
                    println!("Nothing used recently.");
                }
                for m in &medicines {
                    print_medicine(m);
                }
            })
        }
        Commands::Search { symptoms } => {
            let medicines = inv.medicines.search(&symptoms)?;
            out.emit(&medicines, || {
                if medicines.is_empty() {
                    println!("You don't have any medicines for these symptoms.");
                }
                for m in &medicines {
                    print_medicine(m);
                }
            })
        }
        Commands::History { medicine, export } => cmd_history(inv, medicine, export, out),
        Commands::Dashboard => {
            let dashboard = inv.dashboard()?;
            out.emit(&dashboard, || print_dashboard(&dashboard))
        }
        Commands::Symptoms => cmd_symptoms(out),
        Commands::Category { action } => cmd_category(inv, action, out),
    }
}

fn cmd_list(inv: &Inventory, category: Option<String>, out: &Output) -> Result<()> {
    let medicines = match category {
        Some(category) => {
            let category = resolve_category(inv, &category)?;
            inv.medicines.list_by_category(&category.id)?
        }
        None => inv.medicines.list()?,
    };

    out.emit(&medicines, || {
        if medicines.is_empty() {
            println!("No medicines yet.");
        }
        for m in &medicines {
            print_medicine(m);
        }
    })
}

fn cmd_show(inv: &Inventory, id: &str, out: &Output) -> Result<()> {
    let medicine = inv
        .medicines
        .get(id)?
        .ok_or_else(|| Error::NotFound("Medicine not found".into()))?;
    let usage = inv.usage.list_for_medicine(&medicine.id)?;

    let view = serde_json::json!({
        "medicine": medicine,
        "status": medicine.stock_status(),
        "usage": usage,
    });
    out.emit(&view, || {
        println!("\n  {}  [{}]", medicine.name, medicine.stock_status().label());
        println!("  Category: {}", medicine.category_name);
        println!("  Dosage:   {}", medicine.dosage);
        println!(
            "  Stock:    {} (restocks to {})",
            medicine.quantity,
            medicine.restock_quantity()
        );
        if let Some(ref purpose) = medicine.purpose {
            println!("  Purpose:  {}", purpose);
        }
        if let Some(ref notes) = medicine.usage_notes {
            println!("  Notes:    {}", notes);
        }
        if !medicine.symptoms.is_empty() {
            println!("  Treats:   {}", medicine.symptoms.join(", "));
        }
        println!("  Doses taken: {}", medicine.usage_count);
        println!();
        for log in &usage {
            print_log(log);
        }
    })
}

fn cmd_low(inv: &Inventory, export: Option<PathBuf>, out: &Output) -> Result<()> {
    let list = inv.shopping_list()?;

    if let Some(path) = export {
        let rows = export_shopping_list(&list, &path)?;
        return out.emit(
            &serde_json::json!({ "exported": rows, "path": path }),
            || println!("✓ Exported {} medicines to {}", rows, path.display()),
        );
    }

    out.emit(&list, || {
        if list.is_empty() {
            println!("All stocked up!");
            return;
        }
        println!(
            "Need to buy: {} out of stock • {} running low",
            list.out_of_stock, list.running_low
        );
        for (category, medicines) in &list.groups {
            println!("\n  {}", category);
            for m in medicines {
                print_medicine(m);
            }
        }
    })
}

fn cmd_history(
    inv: &Inventory,
    medicine: Option<String>,
    export: Option<PathBuf>,
    out: &Output,
) -> Result<()> {
    let logs = match medicine {
        Some(ref id) => inv.usage.list_for_medicine(id)?,
        None => inv.usage.list_all()?,
    };

    if let Some(path) = export {
        let rows = export_usage_logs(&logs, &path)?;
        return out.emit(
            &serde_json::json!({ "exported": rows, "path": path }),
            || println!("✓ Exported {} doses to {}", rows, path.display()),
        );
    }

    out.emit(&logs, || {
        if logs.is_empty() {
            println!("No doses logged yet.");
        }
        for (day, entries) in group_by_day(&logs) {
            println!("\n{}", day.format("%A, %B %-d, %Y"));
            for log in &entries {
                print_log(log);
            }
        }
    })
}

fn cmd_category(inv: &Inventory, action: CategoryCommand, out: &Output) -> Result<()> {
    match action {
        CategoryCommand::List => {
            let categories = inv.categories.list()?;
            out.emit(&categories, || {
                for c in &categories {
                    println!("  {:<24} {}", c.name, c.id);
                }
            })
        }
        CategoryCommand::Add { name } => {
            let category = inv.categories.create(NewCategory { name })?;
            out.emit(&category, || {
                println!("✓ Added category {}", category.name);
                println!("  id: {}", category.id);
            })
        }
        CategoryCommand::Rename { id, name } => {
            let category = inv
                .categories
                .update(&id, &CategoryUpdate { name: Some(name) })?
                .ok_or_else(|| Error::NotFound("Category not found".into()))?;
            out.emit(&category, || println!("✓ Renamed to {}", category.name))
        }
        CategoryCommand::Delete { id } => {
            if !inv.categories.soft_delete(&id)? {
                return Err(Error::NotFound("Category not found".into()));
            }
            let policy = CategoryRepository::DELETION_POLICY;
            out.emit(
                &serde_json::json!({ "success": true, "deletion": policy }),
                || println!("✓ Category deleted ({})", policy.label()),
            )
        }
    }
}

fn cmd_symptoms(out: &Output) -> Result<()> {
    out.emit(&KNOWN_SYMPTOMS, || {
        for symptom in KNOWN_SYMPTOMS {
            println!("  {}", symptom);
        }
    })
}

/// Look a category up by id, then by name
fn resolve_category(inv: &Inventory, key: &str) -> Result<Category> {
    if let Some(category) = inv.categories.get(key)? {
        return Ok(category);
    }
    inv.categories
        .find_by_name(key)?
        .ok_or_else(|| Error::NotFound(format!("Category not found: {}", key)))
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

fn print_medicine(m: &Medicine) {
    println!(
        "  {:<24} {:>3} left  [{}]  {}  ({})",
        m.name,
        m.quantity,
        m.stock_status().label(),
        m.dosage,
        m.id
    );
}

fn print_log(log: &UsageLog) {
    let symptoms = if log.symptoms.is_empty() {
        String::new()
    } else {
        format!(" for {}", log.symptoms.join(", "))
    };
    println!(
        "  {}  {}{}",
        log.timestamp.format("%H:%M"),
        log.medicine_name,
        symptoms
    );
}

fn print_dashboard(dashboard: &Dashboard) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  MEDKIT");
    println!("╰─────────────────────────────────────────╯");

    println!("\n  Quick access");
    if dashboard.quick_access.is_empty() {
        println!("  (nothing used recently)");
    }
    for m in &dashboard.quick_access {
        print_medicine(m);
    }

    println!("\n  Low stock");
    if dashboard.low_stock.is_empty() {
        println!("  (all stocked up)");
    }
    for m in &dashboard.low_stock {
        print_medicine(m);
    }

    println!("\n  Recent doses");
    for log in &dashboard.recent_logs {
        print_log(log);
    }
    println!();
}
