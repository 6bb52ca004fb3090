//! [`SqliteStore`]: the SQLite implementation of [`MarketStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use polymyr_core::{
  account::{Account, AccountKind, AccountPatch, NewAccount},
  catalog::{Campaign, NewCampaign, NewProduct, Product},
  order::{
    CustomerAddress, NewAddress, NewOrder, NewPaymentLink, Order, OrderQuery,
    PaymentLink,
  },
  session::Session,
  store::{MarketStore, Removal},
};

use crate::{
  encode::{
    encode_dt, encode_uuid, removal, RawAccount, RawAddress, RawCampaign, RawOrder,
    RawPaymentLink, RawProduct, RawSession, ACCOUNT_COLUMNS, ADDRESS_COLUMNS,
    CAMPAIGN_COLUMNS, ORDER_COLUMNS, PRODUCT_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Polymyr marketplace store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the store, e.g. to install triggers that simulate
  /// storage faults.
  #[cfg(any(test, feature = "test-util"))]
  pub async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one account row matching `column = value` for the given kind.
  async fn account_where(
    &self,
    kind: AccountKind,
    column: &'static str,
    value: String,
  ) -> Result<Option<Account>> {
    let kind_str = kind.as_str();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE kind = ?1 AND {column} = ?2"),
            rusqlite::params![kind_str, value],
            RawAccount::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn campaign_where(
    &self,
    column: &'static str,
    id: Uuid,
  ) -> Result<Option<Campaign>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCampaign> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE {column} = ?1"),
            rusqlite::params![id_str],
            RawCampaign::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCampaign::into_campaign).transpose()
  }
}

// ─── MarketStore impl ────────────────────────────────────────────────────────

impl MarketStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_account(&self, input: NewAccount) -> Result<Account> {
    let account = Account {
      account_id:        Uuid::new_v4(),
      kind:              input.kind,
      email:             input.email,
      name:              input.name,
      password_hash:     input.password_hash,
      processor_id:      None,
      federated_subject: input.federated_subject,
      created_at:        Utc::now(),
      maker:             input.maker,
    };

    let id_str     = encode_uuid(account.account_id);
    let kind_str   = account.kind.as_str();
    let email      = account.email.clone();
    let name       = account.name.clone();
    let hash       = account.password_hash.clone();
    let subject    = account.federated_subject.clone();
    let at_str     = encode_dt(account.created_at);
    let cut        = account.maker.as_ref().map(|m| m.cut);
    let secret     = account.maker.as_ref().and_then(|m| m.secret_key.clone());
    let publishable = account.maker.as_ref().and_then(|m| m.publishable_key.clone());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (
             account_id, kind, email, name, password_hash, federated_subject,
             created_at, maker_cut, secret_key, publishable_key
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str, kind_str, email, name, hash, subject, at_str, cut, secret, publishable,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }

  async fn get_account(&self, kind: AccountKind, id: Uuid) -> Result<Option<Account>> {
    self.account_where(kind, "account_id", encode_uuid(id)).await
  }

  async fn find_account_by_email(
    &self,
    kind: AccountKind,
    email: String,
  ) -> Result<Option<Account>> {
    self.account_where(kind, "email", email).await
  }

  async fn find_account_by_subject(
    &self,
    kind: AccountKind,
    subject: String,
  ) -> Result<Option<Account>> {
    self.account_where(kind, "federated_subject", subject).await
  }

  async fn update_account(
    &self,
    kind: AccountKind,
    id: Uuid,
    patch: AccountPatch,
  ) -> Result<Option<Account>> {
    let id_str   = encode_uuid(id);
    let kind_str = kind.as_str();
    let is_maker = kind == AccountKind::Maker;

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE accounts SET
             name            = COALESCE(?3, name),
             email           = COALESCE(?4, email),
             processor_id    = COALESCE(?5, processor_id),
             secret_key      = CASE WHEN ?8 THEN COALESCE(?6, secret_key) ELSE secret_key END,
             publishable_key = CASE WHEN ?8 THEN COALESCE(?7, publishable_key) ELSE publishable_key END
           WHERE account_id = ?1 AND kind = ?2",
          rusqlite::params![
            id_str,
            kind_str,
            patch.name,
            patch.email,
            patch.processor_id,
            patch.secret_key,
            patch.publishable_key,
            is_maker,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_account(kind, id).await
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn insert_session(&self, session: Session) -> Result<()> {
    let kind_str = session.account_kind.as_str();
    let id_str   = encode_uuid(session.account_id);
    let at_str   = encode_dt(session.created_at);
    let exp_str  = session.expires_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, account_kind, account_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![session.token_digest, kind_str, id_str, at_str, exp_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_session(&self, token_digest: String) -> Result<Option<Session>> {
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token_digest, account_kind, account_id, created_at, expires_at
             FROM sessions WHERE token_digest = ?1",
            rusqlite::params![token_digest],
            |row| {
              Ok(RawSession {
                token_digest: row.get(0)?,
                account_kind: row.get(1)?,
                account_id:   row.get(2)?,
                created_at:   row.get(3)?,
                expires_at:   row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn delete_session(&self, token_digest: String) -> Result<bool> {
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE token_digest = ?1",
          rusqlite::params![token_digest],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn create_product(&self, input: NewProduct) -> Result<Product> {
    let product = Product {
      product_id:  Uuid::new_v4(),
      maker_id:    input.maker_id,
      name:        input.name,
      description: input.description,
      price_cents: input.price_cents,
      created_at:  Utc::now(),
    };

    let id_str    = encode_uuid(product.product_id);
    let maker_str = encode_uuid(product.maker_id);
    let name      = product.name.clone();
    let desc      = product.description.clone();
    let price     = product.price_cents;
    let at_str    = encode_dt(product.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO products (product_id, maker_id, name, description, price_cents, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, maker_str, name, desc, price, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(product)
  }

  async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProduct> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
            rusqlite::params![id_str],
            RawProduct::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProduct::into_product).transpose()
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let raws: Vec<RawProduct> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at, product_id"
        ))?;
        let rows = stmt
          .query_map([], RawProduct::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProduct::into_product).collect()
  }

  async fn delete_product(&self, id: Uuid) -> Result<Removal> {
    let id_str = encode_uuid(id);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(removal(conn.execute(
            "DELETE FROM products WHERE product_id = ?1",
            rusqlite::params![id_str],
          ))?)
        })
        .await?,
    )
  }

  async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign> {
    let campaign = Campaign {
      campaign_id:      Uuid::new_v4(),
      product_id:       input.product_id,
      maker_id:         input.maker_id,
      units:            input.units,
      purchased_units:  0,
      end_date:         input.end_date,
      amount_off_cents: input.amount_off_cents,
      created_at:       Utc::now(),
    };

    let id_str      = encode_uuid(campaign.campaign_id);
    let product_str = encode_uuid(campaign.product_id);
    let maker_str   = encode_uuid(campaign.maker_id);
    let units       = campaign.units;
    let end_str     = encode_dt(campaign.end_date);
    let off         = campaign.amount_off_cents;
    let at_str      = encode_dt(campaign.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO campaigns (
             campaign_id, product_id, maker_id, units, purchased_units,
             end_date, amount_off_cents, created_at
           ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
          rusqlite::params![id_str, product_str, maker_str, units, end_str, off, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(campaign)
  }

  async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
    self.campaign_where("campaign_id", id).await
  }

  async fn campaign_for_product(&self, product_id: Uuid) -> Result<Option<Campaign>> {
    self.campaign_where("product_id", product_id).await
  }

  async fn delete_campaign(&self, id: Uuid) -> Result<Removal> {
    let id_str = encode_uuid(id);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(removal(conn.execute(
            "DELETE FROM campaigns WHERE campaign_id = ?1",
            rusqlite::params![id_str],
          ))?)
        })
        .await?,
    )
  }

  async fn reserve_unit(&self, campaign_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(campaign_id);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE campaigns SET purchased_units = purchased_units + 1
           WHERE campaign_id = ?1 AND purchased_units < units",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(n == 1)
  }

  async fn release_unit(&self, campaign_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(campaign_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE campaigns SET purchased_units = purchased_units - 1
           WHERE campaign_id = ?1 AND purchased_units > 0",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Shipping addresses ────────────────────────────────────────────────────

  async fn create_address(&self, input: NewAddress) -> Result<CustomerAddress> {
    let address = CustomerAddress {
      address_id:  Uuid::new_v4(),
      customer_id: input.customer_id,
      first_name:  input.first_name,
      last_name:   input.last_name,
      address:     input.address,
      apartment:   input.apartment,
      city:        input.city,
      state:       input.state,
      zip:         input.zip,
      phone:       input.phone,
    };

    let a = address.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO customer_addresses (
             address_id, customer_id, first_name, last_name, address,
             apartment, city, state, zip, phone
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            encode_uuid(a.address_id),
            encode_uuid(a.customer_id),
            a.first_name,
            a.last_name,
            a.address,
            a.apartment,
            a.city,
            a.state,
            a.zip,
            a.phone,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(address)
  }

  async fn get_address(&self, id: Uuid) -> Result<Option<CustomerAddress>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAddress> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ADDRESS_COLUMNS} FROM customer_addresses WHERE address_id = ?1"),
            rusqlite::params![id_str],
            RawAddress::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAddress::into_address).transpose()
  }

  async fn list_addresses(&self, customer_id: Uuid) -> Result<Vec<CustomerAddress>> {
    let id_str = encode_uuid(customer_id);

    let raws: Vec<RawAddress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ADDRESS_COLUMNS} FROM customer_addresses WHERE customer_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAddress::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAddress::into_address).collect()
  }

  async fn delete_address(&self, id: Uuid) -> Result<Removal> {
    let id_str = encode_uuid(id);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(removal(conn.execute(
            "DELETE FROM customer_addresses WHERE address_id = ?1",
            rusqlite::params![id_str],
          ))?)
        })
        .await?,
    )
  }

  // ── Payment links ─────────────────────────────────────────────────────────

  async fn find_payment_link(
    &self,
    maker_id: Uuid,
    customer_id: Uuid,
  ) -> Result<Option<PaymentLink>> {
    let maker_str    = encode_uuid(maker_id);
    let customer_str = encode_uuid(customer_id);

    let raw: Option<RawPaymentLink> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT link_id, maker_id, customer_id, processor_customer_id, created_at
             FROM payment_links WHERE maker_id = ?1 AND customer_id = ?2",
            rusqlite::params![maker_str, customer_str],
            |row| {
              Ok(RawPaymentLink {
                link_id:               row.get(0)?,
                maker_id:              row.get(1)?,
                customer_id:           row.get(2)?,
                processor_customer_id: row.get(3)?,
                created_at:            row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPaymentLink::into_link).transpose()
  }

  async fn upsert_payment_link(&self, input: NewPaymentLink) -> Result<PaymentLink> {
    let id_str       = encode_uuid(Uuid::new_v4());
    let maker_str    = encode_uuid(input.maker_id);
    let customer_str = encode_uuid(input.customer_id);
    let at_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO payment_links (link_id, maker_id, customer_id, processor_customer_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (maker_id, customer_id) DO NOTHING",
          rusqlite::params![id_str, maker_str, customer_str, input.processor_customer_id, at_str],
        )?;
        Ok(())
      })
      .await?;

    self
      .find_payment_link(input.maker_id, input.customer_id)
      .await?
      .ok_or(Error::Vanished("payment link"))
  }

  // ── Orders ────────────────────────────────────────────────────────────────

  async fn insert_order(&self, input: NewOrder) -> Result<Order> {
    let order = Order {
      order_id:    Uuid::new_v4(),
      product_id:  input.product_id,
      campaign_id: input.campaign_id,
      maker_id:    input.maker_id,
      customer_id: input.customer_id,
      address_id:  input.address_id,
      card:        input.card,
      charge_id:   input.charge_id,
      fulfilled:   false,
      created_at:  Utc::now(),
    };

    let o = order.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO orders (
             order_id, product_id, campaign_id, maker_id, customer_id,
             address_id, card, charge_id, fulfilled, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
          rusqlite::params![
            encode_uuid(o.order_id),
            encode_uuid(o.product_id),
            encode_uuid(o.campaign_id),
            encode_uuid(o.maker_id),
            encode_uuid(o.customer_id),
            encode_uuid(o.address_id),
            o.card,
            o.charge_id,
            encode_dt(o.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(order)
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrder> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
            rusqlite::params![id_str],
            RawOrder::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }

  async fn list_orders<'a>(&'a self, query: &'a OrderQuery) -> Result<Vec<Order>> {
    let customer_str = query.customer_id.map(encode_uuid);
    let maker_str    = query.maker_id.map(encode_uuid);
    let fulfilled    = query.fulfilled;

    let raws: Vec<RawOrder> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ORDER_COLUMNS} FROM orders
           WHERE (?1 IS NULL OR customer_id = ?1)
             AND (?2 IS NULL OR maker_id = ?2)
             AND (?3 IS NULL OR fulfilled = ?3)
           ORDER BY created_at, order_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![customer_str, maker_str, fulfilled],
            RawOrder::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOrder::into_order).collect()
  }

  async fn set_order_fulfilled(&self, id: Uuid, fulfilled: bool) -> Result<Option<Order>> {
    let id_str = encode_uuid(id);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE orders SET fulfilled = ?2 WHERE order_id = ?1",
          rusqlite::params![id_str, fulfilled],
        )?)
      })
      .await?;

    if n == 0 {
      return Ok(None);
    }
    self.get_order(id).await
  }
}
