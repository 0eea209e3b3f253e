/// Operator tasks against the production database.
///
/// Usage:
///   school-admin create-tenant --name "Lincoln Elementary" --subdomain lincoln --contact-email office@lincoln.edu
///   school-admin create-user --tenant lincoln --email admin@lincoln.edu --password ... --first-name Ada --last-name Park --role admin
///   school-admin set-subscription --tenant lincoln --plan standard --status active --student-limit 400 --monthly-price 199 --billing-email billing@lincoln.edu

use anyhow::Context;
use clap::{Parser, Subcommand};

use schoolhub_api::{
    config::Config,
    db::{self, BillingStore, PgStorage, TenantStore},
    models::{
        tenant::{CreateTenantRequest, SubscriptionStatus, UpsertSubscriptionRequest},
        user::{RegisterRequest, Role},
    },
    services::{auth::AuthService, subscriptions::validate_subscription, tenants::TenantService},
};

#[derive(Parser)]
#[command(name = "school-admin", about = "Tenant and account administration for schoolhub")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision a tenant with a trial subscription
    CreateTenant {
        #[arg(long)]
        name: String,
        #[arg(long)]
        subdomain: String,
        #[arg(long)]
        contact_email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Create an account of any role in a tenant
    CreateUser {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, value_enum, default_value_t = Role::Admin)]
        role: Role,
    },
    /// Replace the tenant's subscription
    SetSubscription {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        plan: String,
        #[arg(long, value_enum)]
        status: SubscriptionStatus,
        #[arg(long)]
        student_limit: i32,
        #[arg(long)]
        monthly_price: f64,
        #[arg(long)]
        billing_email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    let store = PgStorage::new(pool);

    match args.command {
        Command::CreateTenant { name, subdomain, contact_email, phone, address } => {
            let req = CreateTenantRequest { name, subdomain, contact_email, phone, address };
            let (tenant, subscription) = TenantService::provision(&store, &req).await?;
            tracing::info!(
                "Created tenant {} ({}), trial ends {:?}",
                tenant.subdomain,
                tenant.id,
                subscription.trial_ends_at
            );
        }
        Command::CreateUser { tenant, email, password, first_name, last_name, role } => {
            let tenant = store
                .tenant_by_subdomain(&tenant.to_lowercase())
                .await?
                .with_context(|| format!("No tenant with subdomain {tenant}"))?;
            let auth = AuthService::from_config(&config);
            let req = RegisterRequest {
                email,
                password,
                first_name,
                last_name,
                role: Some(role),
                phone: None,
                address: None,
            };
            let user = auth.register(&store, &tenant, &req, role).await?;
            tracing::info!("Created {} {} in {}", user.role, user.email, tenant.subdomain);
        }
        Command::SetSubscription { tenant, plan, status, student_limit, monthly_price, billing_email } => {
            let tenant = store
                .tenant_by_subdomain(&tenant.to_lowercase())
                .await?
                .with_context(|| format!("No tenant with subdomain {tenant}"))?;
            let req = UpsertSubscriptionRequest {
                plan_name: plan,
                status,
                student_limit,
                monthly_price,
                billing_email,
                start_date: None,
                end_date: None,
                trial_ends_at: None,
            };
            validate_subscription(&req)?;
            let sub = store.upsert_subscription(tenant.id, &req).await?;
            tracing::info!("Subscription for {} is now {} ({:?})", tenant.subdomain, sub.plan_name, sub.status);
        }
    }

    Ok(())
}
