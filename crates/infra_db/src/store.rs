//! PostgreSQL Billing Store
//!
//! `PostgresBillingStore` implements the billing engine's `BillingStore`
//! port on top of the schema in `migrations/0001_billing_schema.sql`.
//!
//! # Error Handling
//!
//! SQLx errors go through [`DatabaseError`] and are lifted to `PortError`:
//! unique violations (serial number, fiscal id, one meter per customer)
//! become `Conflict`, check and foreign key violations become `Validation`.
//!
//! # Concurrency
//!
//! - `commit_reading` locks the meter row (`SELECT ... FOR UPDATE`) and
//!   refuses to write if the stored cumulative value moved.
//! - `record_overdue` and `settle_invoice` only touch invoices whose stored
//!   status is still `PENDING` or `OVERDUE`, so a settlement and a sweep
//!   never overwrite each other.
//! - `record_overdue` suspends with a conditional update on
//!   `status <> 'SUSPENDED'`, so two sweeps never both count a meter and the
//!   first suspension timestamp is kept.
//! - `update_meter` never writes the cumulative reading; only
//!   `commit_reading` does, under the row lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let store: Arc<dyn BillingStore> = Arc::new(PostgresBillingStore::new(pool));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, MeterId, PortError,
    TariffId,
};
use domain_billing::{
    BillingStore, Customer, Invoice, InvoiceQuery, InvoiceStatus, Meter, MeterStatus,
    OverdueWrite, Payment, Reading, Tariff,
};

use crate::error::DatabaseError;
use crate::rows::{
    convert_all, CustomerRow, InvoiceRow, MeterRow, PaymentRow, ReadingRow, TariffRow,
};

const ADAPTER_ID: &str = "postgres-billing-store";

const CUSTOMER_COLUMNS: &str = "id, name, fiscal_id, national_id, address, phone, email, \
     billing_mode, status, balance, currency, tariff_id, notes, created_at, updated_at";

const TARIFF_COLUMNS: &str = "id, name, category, currency, unit_price, fixed_fee, \
     postpaid_surcharge, prepaid_surcharge, description, active, created_at";

const METER_COLUMNS: &str = "id, serial_number, billing_mode, connection_type, card_number, \
     customer_id, installation_address, installation_date, max_power_kw, status, \
     current_reading, last_reading_at, suspended_at, notes, created_at";

const READING_COLUMNS: &str =
    "id, meter_id, previous_value, current_value, delta, recorded_at, operator, notes";

const INVOICE_COLUMNS: &str = "id, invoice_number, customer_id, meter_id, period, \
     previous_reading, current_reading, consumption, currency, consumption_value, other_fees, \
     late_fee, interest, total, status, issue_date, due_date, paid_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, invoice_id, amount, currency, method, reference, paid_at, notes";

/// Logs a failed statement and lifts the error into the port vocabulary
fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> PortError {
    move |e| {
        let err = DatabaseError::from(e);
        error!(operation, error = %err, "Database error");
        err.into()
    }
}

fn corrupt(e: DatabaseError) -> PortError {
    error!(error = %e, "Stored row could not be mapped");
    e.into()
}

/// PostgreSQL-backed implementation of the `BillingStore` port
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_meter<'e>(
        executor: impl PgExecutor<'e>,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<Meter>, PortError> {
        let row = sqlx::query_as::<_, MeterRow>(sql)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(db_error("fetch_meter"))?;
        row.map(Meter::try_from).transpose().map_err(corrupt)
    }
}

async fn insert_invoice_with<'e>(
    executor: impl PgExecutor<'e>,
    invoice: &Invoice,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_number, customer_id, meter_id, period,
            previous_reading, current_reading, consumption, currency,
            consumption_value, other_fees, late_fee, interest, total,
            status, issue_date, due_date, paid_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(&invoice.invoice_number)
    .bind(Uuid::from(invoice.customer_id))
    .bind(invoice.meter_id.map(Uuid::from))
    .bind(&invoice.period)
    .bind(invoice.previous_reading)
    .bind(invoice.current_reading)
    .bind(invoice.consumption)
    .bind(invoice.total.currency().code())
    .bind(invoice.consumption_value.amount())
    .bind(invoice.other_fees.amount())
    .bind(invoice.late_fee.amount())
    .bind(invoice.interest.amount())
    .bind(invoice.total.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.paid_at)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Writes penalty fields, total and status while the stored invoice is unpaid
async fn penalise_invoice_with<'e>(
    executor: impl PgExecutor<'e>,
    invoice: &Invoice,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET
            late_fee = $2, interest = $3, total = $4, status = $5, updated_at = $6
        WHERE id = $1 AND status IN ('PENDING', 'OVERDUE')
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(invoice.late_fee.amount())
    .bind(invoice.interest.amount())
    .bind(invoice.total.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.updated_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

async fn invoice_exists_with<'e>(
    executor: impl PgExecutor<'e>,
    id: InvoiceId,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM invoices WHERE id = $1)")
        .bind(Uuid::from(id))
        .fetch_one(executor)
        .await
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(
                ADAPTER_ID,
                latency_ms,
                format!("Database error: {}", e),
            ),
        }
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    // ========================================================================
    // Customers
    // ========================================================================

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn insert_customer(&self, customer: &Customer) -> Result<(), PortError> {
        debug!("Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, fiscal_id, national_id, address, phone, email,
                billing_mode, status, balance, currency, tariff_id, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(Uuid::from(customer.id))
        .bind(&customer.name)
        .bind(&customer.fiscal_id)
        .bind(&customer.national_id)
        .bind(&customer.address)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.billing_mode.as_str())
        .bind(customer.status.as_str())
        .bind(customer.balance.amount())
        .bind(customer.balance.currency().code())
        .bind(customer.tariff_id.map(Uuid::from))
        .bind(&customer.notes)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert_customer"))?;

        Ok(())
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_customer"))?
            .ok_or_else(|| PortError::not_found("Customer", id))?;

        Customer::try_from(row).map_err(corrupt)
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn update_customer(&self, customer: &Customer) -> Result<(), PortError> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = $2, fiscal_id = $3, national_id = $4, address = $5, phone = $6,
                email = $7, billing_mode = $8, status = $9, balance = $10, currency = $11,
                tariff_id = $12, notes = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(customer.id))
        .bind(&customer.name)
        .bind(&customer.fiscal_id)
        .bind(&customer.national_id)
        .bind(&customer.address)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.billing_mode.as_str())
        .bind(customer.status.as_str())
        .bind(customer.balance.amount())
        .bind(customer.balance.currency().code())
        .bind(customer.tariff_id.map(Uuid::from))
        .bind(&customer.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("update_customer"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Customer", customer.id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, id");
        let rows = sqlx::query_as::<_, CustomerRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_customers"))?;

        convert_all(rows).map_err(corrupt)
    }

    // ========================================================================
    // Tariffs
    // ========================================================================

    #[instrument(skip(self, tariff), fields(tariff_id = %tariff.id))]
    async fn insert_tariff(&self, tariff: &Tariff) -> Result<(), PortError> {
        sqlx::query(
            r#"
            INSERT INTO tariffs (
                id, name, category, currency, unit_price, fixed_fee,
                postpaid_surcharge, prepaid_surcharge, description, active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::from(tariff.id))
        .bind(&tariff.name)
        .bind(tariff.category.as_str())
        .bind(tariff.unit_price.currency().code())
        .bind(tariff.unit_price.amount())
        .bind(tariff.fixed_fee.amount())
        .bind(tariff.postpaid_surcharge.amount())
        .bind(tariff.prepaid_surcharge.amount())
        .bind(&tariff.description)
        .bind(tariff.active)
        .bind(tariff.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert_tariff"))?;

        Ok(())
    }

    #[instrument(skip(self), fields(tariff_id = %id))]
    async fn get_tariff(&self, id: TariffId) -> Result<Tariff, PortError> {
        let sql = format!("SELECT {TARIFF_COLUMNS} FROM tariffs WHERE id = $1");
        let row = sqlx::query_as::<_, TariffRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_tariff"))?
            .ok_or_else(|| PortError::not_found("Tariff", id))?;

        Tariff::try_from(row).map_err(corrupt)
    }

    #[instrument(skip(self, tariff), fields(tariff_id = %tariff.id))]
    async fn update_tariff(&self, tariff: &Tariff) -> Result<(), PortError> {
        let result = sqlx::query(
            r#"
            UPDATE tariffs SET
                name = $2, category = $3, unit_price = $4, fixed_fee = $5,
                postpaid_surcharge = $6, prepaid_surcharge = $7, description = $8, active = $9
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(tariff.id))
        .bind(&tariff.name)
        .bind(tariff.category.as_str())
        .bind(tariff.unit_price.amount())
        .bind(tariff.fixed_fee.amount())
        .bind(tariff.postpaid_surcharge.amount())
        .bind(tariff.prepaid_surcharge.amount())
        .bind(&tariff.description)
        .bind(tariff.active)
        .execute(&self.pool)
        .await
        .map_err(db_error("update_tariff"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Tariff", tariff.id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tariffs(&self) -> Result<Vec<Tariff>, PortError> {
        let sql = format!("SELECT {TARIFF_COLUMNS} FROM tariffs ORDER BY name, id");
        let rows = sqlx::query_as::<_, TariffRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_tariffs"))?;

        convert_all(rows).map_err(corrupt)
    }

    // ========================================================================
    // Meters
    // ========================================================================

    #[instrument(skip(self, meter), fields(meter_id = %meter.id, serial = %meter.serial_number))]
    async fn insert_meter(&self, meter: &Meter) -> Result<(), PortError> {
        debug!("Inserting meter");

        sqlx::query(
            r#"
            INSERT INTO meters (
                id, serial_number, billing_mode, connection_type, card_number, customer_id,
                installation_address, installation_date, max_power_kw, status,
                current_reading, last_reading_at, suspended_at, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(Uuid::from(meter.id))
        .bind(&meter.serial_number)
        .bind(meter.billing_mode.as_str())
        .bind(meter.connection_type.as_str())
        .bind(&meter.card_number)
        .bind(meter.customer_id.map(Uuid::from))
        .bind(&meter.installation_address)
        .bind(meter.installation_date)
        .bind(meter.max_power_kw)
        .bind(meter.status.as_str())
        .bind(meter.current_reading)
        .bind(meter.last_reading_at)
        .bind(meter.suspended_at)
        .bind(&meter.notes)
        .bind(meter.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert_meter"))?;

        Ok(())
    }

    #[instrument(skip(self), fields(meter_id = %id))]
    async fn get_meter(&self, id: MeterId) -> Result<Meter, PortError> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters WHERE id = $1");
        Self::fetch_meter(&self.pool, &sql, id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Meter", id))
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn find_meter_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Meter>, PortError> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters WHERE customer_id = $1");
        Self::fetch_meter(&self.pool, &sql, customer_id.into()).await
    }

    #[instrument(skip(self, meter), fields(meter_id = %meter.id))]
    async fn update_meter(&self, meter: &Meter) -> Result<(), PortError> {
        let result = sqlx::query(
            r#"
            UPDATE meters SET
                serial_number = $2, billing_mode = $3, connection_type = $4, card_number = $5,
                customer_id = $6, installation_address = $7, installation_date = $8,
                max_power_kw = $9, status = $10, suspended_at = $11, notes = $12
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(meter.id))
        .bind(&meter.serial_number)
        .bind(meter.billing_mode.as_str())
        .bind(meter.connection_type.as_str())
        .bind(&meter.card_number)
        .bind(meter.customer_id.map(Uuid::from))
        .bind(&meter.installation_address)
        .bind(meter.installation_date)
        .bind(meter.max_power_kw)
        .bind(meter.status.as_str())
        .bind(meter.suspended_at)
        .bind(&meter.notes)
        .execute(&self.pool)
        .await
        .map_err(db_error("update_meter"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Meter", meter.id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_meters(&self) -> Result<Vec<Meter>, PortError> {
        let sql = format!("SELECT {METER_COLUMNS} FROM meters ORDER BY serial_number");
        let rows = sqlx::query_as::<_, MeterRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_meters"))?;

        convert_all(rows).map_err(corrupt)
    }

    // ========================================================================
    // Readings
    // ========================================================================

    #[instrument(
        skip(self, meter, reading, invoice),
        fields(meter_id = %meter.id, reading_id = %reading.id, invoiced = invoice.is_some())
    )]
    async fn commit_reading(
        &self,
        meter: &Meter,
        reading: &Reading,
        invoice: Option<&Invoice>,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(db_error("commit_reading"))?;

        let stored: Option<Decimal> =
            sqlx::query_scalar("SELECT current_reading FROM meters WHERE id = $1 FOR UPDATE")
                .bind(Uuid::from(meter.id))
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("commit_reading"))?;

        match stored {
            None => return Err(PortError::not_found("Meter", meter.id)),
            Some(current) if current != reading.previous_value => {
                warn!(
                    stored = %current,
                    expected = %reading.previous_value,
                    "Meter reading moved concurrently"
                );
                return Err(PortError::conflict(format!(
                    "meter {} reading changed from {} to {} since it was loaded",
                    meter.serial_number, reading.previous_value, current
                )));
            }
            Some(_) => {}
        }

        sqlx::query(
            r#"
            UPDATE meters SET
                current_reading = $2, last_reading_at = $3, billing_mode = $4
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(meter.id))
        .bind(meter.current_reading)
        .bind(meter.last_reading_at)
        .bind(meter.billing_mode.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("commit_reading"))?;

        sqlx::query(
            r#"
            INSERT INTO readings (
                id, meter_id, previous_value, current_value, delta, recorded_at, operator, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(reading.id))
        .bind(Uuid::from(reading.meter_id))
        .bind(reading.previous_value)
        .bind(reading.current_value)
        .bind(reading.delta)
        .bind(reading.recorded_at)
        .bind(&reading.operator)
        .bind(&reading.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_error("commit_reading"))?;

        if let Some(invoice) = invoice {
            insert_invoice_with(&mut *tx, invoice)
                .await
                .map_err(db_error("commit_reading"))?;
        }

        tx.commit().await.map_err(db_error("commit_reading"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_readings(&self) -> Result<Vec<Reading>, PortError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings ORDER BY recorded_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_readings"))?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    #[instrument(skip(self), fields(meter_id = %meter_id))]
    async fn readings_for_meter(&self, meter_id: MeterId) -> Result<Vec<Reading>, PortError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE meter_id = $1 \
             ORDER BY recorded_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(Uuid::from(meter_id))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("readings_for_meter"))?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    #[instrument(skip(self))]
    async fn next_invoice_number(&self, year: i32) -> Result<String, PortError> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (year, last_value) VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = invoice_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("next_invoice_number"))?;

        Ok(format!("FAT-{year}-{seq:06}"))
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        insert_invoice_with(&self.pool, invoice)
            .await
            .map_err(db_error("insert_invoice"))
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_invoice"))?
            .ok_or_else(|| PortError::not_found("Invoice", id))?;

        Invoice::try_from(row).map_err(corrupt)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn settle_invoice(
        &self,
        id: InvoiceId,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, PortError> {
        let sql = format!(
            r#"
            UPDATE invoices SET status = $2, paid_at = $3, updated_at = $3
            WHERE id = $1 AND status IN ('PENDING', 'OVERDUE')
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(Uuid::from(id))
            .bind(InvoiceStatus::Paid.as_str())
            .bind(paid_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("settle_invoice"))?;

        match row {
            Some(row) => Invoice::try_from(row).map_err(corrupt),
            None => {
                let exists = invoice_exists_with(&self.pool, id)
                    .await
                    .map_err(db_error("settle_invoice"))?;
                if exists {
                    warn!("Invoice is no longer unpaid");
                    Err(PortError::conflict(format!("invoice {id} is no longer unpaid")))
                } else {
                    Err(PortError::not_found("Invoice", id))
                }
            }
        }
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, meter_id = %meter_id))]
    async fn invoice_exists(
        &self,
        customer_id: CustomerId,
        meter_id: MeterId,
        period: &str,
    ) -> Result<bool, PortError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invoices
                WHERE customer_id = $1 AND meter_id = $2 AND period = $3
            )
            "#,
        )
        .bind(Uuid::from(customer_id))
        .bind(Uuid::from(meter_id))
        .bind(period)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("invoice_exists"))
    }

    #[instrument(skip(self))]
    async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.as_str().to_string()).collect();
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR meter_id = $2)
              AND (cardinality($3::text[]) = 0 OR status = ANY($3))
              AND ($4::date IS NULL OR due_date < $4)
            ORDER BY due_date, invoice_number
            "#
        );

        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(query.customer_id.map(Uuid::from))
            .bind(query.meter_id.map(Uuid::from))
            .bind(statuses)
            .bind(query.due_before)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find_invoices"))?;

        convert_all(rows).map_err(corrupt)
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn record_overdue(
        &self,
        invoice: &Invoice,
        suspend: Option<(MeterId, DateTime<Utc>)>,
    ) -> Result<OverdueWrite, PortError> {
        let mut tx = self.pool.begin().await.map_err(db_error("record_overdue"))?;

        let affected = penalise_invoice_with(&mut *tx, invoice)
            .await
            .map_err(db_error("record_overdue"))?;
        if affected == 0 {
            let exists = invoice_exists_with(&mut *tx, invoice.id)
                .await
                .map_err(db_error("record_overdue"))?;
            if !exists {
                return Err(PortError::not_found("Invoice", invoice.id));
            }
            debug!("Invoice no longer unpaid; skipped");
            return Ok(OverdueWrite::Skipped);
        }

        let suspended = match suspend {
            Some((meter_id, at)) => {
                // Owner's billing mode is copied whether or not the status changes
                let synced = sqlx::query(
                    r#"
                    UPDATE meters m SET billing_mode = c.billing_mode
                    FROM customers c
                    WHERE m.id = $1 AND c.id = m.customer_id
                    "#,
                )
                .bind(Uuid::from(meter_id))
                .execute(&mut *tx)
                .await
                .map_err(db_error("record_overdue"))?;
                debug!(synced = synced.rows_affected(), "Meter billing mode re-synced");

                let result = sqlx::query(
                    r#"
                    UPDATE meters SET status = $2, suspended_at = $3
                    WHERE id = $1 AND status <> $2
                    "#,
                )
                .bind(Uuid::from(meter_id))
                .bind(MeterStatus::Suspended.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(db_error("record_overdue"))?;
                result.rows_affected() == 1
            }
            None => false,
        };

        tx.commit().await.map_err(db_error("record_overdue"))?;
        Ok(OverdueWrite::Penalised { suspended })
    }

    // ========================================================================
    // Payments
    // ========================================================================

    #[instrument(
        skip(self, payment),
        fields(payment_id = %payment.id, invoice_id = %payment.invoice_id)
    )]
    async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, amount, currency, method, reference, paid_at, notes
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE EXISTS (SELECT 1 FROM invoices WHERE id = $2)
            "#,
        )
        .bind(Uuid::from(payment.id))
        .bind(Uuid::from(payment.invoice_id))
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().code())
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .bind(&payment.notes)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert_payment"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Invoice", payment.invoice_id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn payments_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, PortError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY paid_at, id"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(Uuid::from(invoice_id))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("payments_for_invoice"))?;

        convert_all(rows).map_err(corrupt)
    }

    #[instrument(skip(self))]
    async fn list_payments(&self) -> Result<Vec<Payment>, PortError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY paid_at, id");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_payments"))?;

        convert_all(rows).map_err(corrupt)
    }
}
