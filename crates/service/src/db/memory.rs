//! In-memory backend.
//!
//! Holds every table in one struct behind a single `RwLock`, so each trait
//! method is atomic with respect to every other: a franchise delete and its
//! store cascade are never observed half-done. Used by the test suites and
//! when `PIZZA_DATABASE_URL=memory`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use pizza_core::{Email, FranchiseId, MenuItemId, OrderId, Price, Role, StoreId, UserId};

use super::{
    Database, FranchiseQuery, FranchiseRegistry, MenuCatalog, OrderLedger, RepositoryError,
    TokenStore, UserDirectory, name_matches,
};
use crate::models::{
    Franchise, FranchiseAdmin, FranchisePage, MenuItem, NewMenuItem, NewOrder, NewUser, Order,
    OrderPage, Store, User, UserUpdate,
};

#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct FranchiseRecord {
    name: String,
    admins: Vec<UserId>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<UserId, UserRecord>,
    tokens: HashMap<String, UserId>,
    franchises: BTreeMap<FranchiseId, FranchiseRecord>,
    stores: BTreeMap<StoreId, Store>,
    menu: BTreeMap<MenuItemId, MenuItem>,
    orders: BTreeMap<OrderId, Order>,
}

impl Tables {
    /// Ids are shared across tables; each one is still strictly increasing.
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|r| &r.user.email == email && Some(r.user.id) != except)
    }

    fn store_revenue(&self, store: StoreId) -> Price {
        self.orders
            .values()
            .filter(|o| o.store_id == store)
            .map(Order::total)
            .sum()
    }

    fn franchise(&self, id: FranchiseId, with_revenue: bool) -> Option<Franchise> {
        let record = self.franchises.get(&id)?;

        let admins = record
            .admins
            .iter()
            .filter_map(|admin| self.users.get(admin))
            .map(|r| FranchiseAdmin {
                id: r.user.id,
                name: r.user.name.clone(),
                email: r.user.email.clone(),
            })
            .collect();

        let stores = self
            .stores
            .values()
            .filter(|s| s.franchise_id == id)
            .map(|s| Store {
                total_revenue: with_revenue.then(|| self.store_revenue(s.id)),
                ..s.clone()
            })
            .collect();

        Some(Franchise {
            id,
            name: record.name.clone(),
            admins,
            stores,
        })
    }
}

/// In-memory implementation of every persistence trait.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryDatabase {
    async fn create_token(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.tokens.insert(token_hash.to_owned(), user_id);
        Ok(())
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.tables.read().await.tokens.get(token_hash).copied())
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables.write().await.tokens.remove(token_hash).is_some())
    }
}

#[async_trait]
impl UserDirectory for MemoryDatabase {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let id = UserId::new(tables.next_id());
        let created = User {
            id,
            name: user.name,
            email: user.email,
            roles: user.roles,
        };
        tables.users.insert(
            id,
            UserRecord {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .get(&id)
            .map(|r| r.user.clone()))
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .find_credentials(email)
            .await?
            .map(|(user, _)| user))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &update.email
            && tables.email_taken(email, Some(id))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let record = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(name) = update.name {
            record.user.name = name;
        }
        if let Some(email) = update.email {
            record.user.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            record.password_hash = password_hash;
        }
        Ok(record.user.clone())
    }

    async fn grant_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let record = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.user.roles.insert(role);
        Ok(())
    }
}

#[async_trait]
impl FranchiseRegistry for MemoryDatabase {
    async fn create_franchise(
        &self,
        name: &str,
        admins: &[UserId],
    ) -> Result<Franchise, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables
            .franchises
            .values()
            .any(|f| f.name.eq_ignore_ascii_case(name))
        {
            return Err(RepositoryError::Conflict(
                "franchise name already exists".to_owned(),
            ));
        }
        if admins.iter().any(|admin| !tables.users.contains_key(admin)) {
            return Err(RepositoryError::NotFound);
        }

        let mut unique: Vec<UserId> = Vec::with_capacity(admins.len());
        for admin in admins {
            if !unique.contains(admin) {
                unique.push(*admin);
            }
        }

        let id = FranchiseId::new(tables.next_id());
        for admin in &unique {
            if let Some(record) = tables.users.get_mut(admin) {
                record.user.roles.insert(Role::Franchisee { franchise_id: id });
            }
        }
        tables.franchises.insert(
            id,
            FranchiseRecord {
                name: name.to_owned(),
                admins: unique,
            },
        );

        tables.franchise(id, true).ok_or(RepositoryError::NotFound)
    }

    async fn list_franchises(
        &self,
        query: &FranchiseQuery,
    ) -> Result<FranchisePage, RepositoryError> {
        let tables = self.tables.read().await;
        let limit = query.limit as usize;
        let skip = query.page as usize * limit;

        let mut matching = tables
            .franchises
            .iter()
            .filter(|(_, f)| {
                query
                    .name
                    .as_deref()
                    .is_none_or(|pattern| name_matches(pattern, &f.name))
            })
            .map(|(id, _)| *id)
            .skip(skip);

        let franchises: Vec<Franchise> = matching
            .by_ref()
            .take(limit)
            .filter_map(|id| tables.franchise(id, false))
            .collect();
        let more = matching.next().is_some();

        Ok(FranchisePage { franchises, more })
    }

    async fn franchises_for_admin(&self, user: UserId) -> Result<Vec<Franchise>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .franchises
            .iter()
            .filter(|(_, f)| f.admins.contains(&user))
            .filter_map(|(id, _)| tables.franchise(*id, true))
            .collect())
    }

    async fn get_franchise(&self, id: FranchiseId) -> Result<Option<Franchise>, RepositoryError> {
        Ok(self.tables.read().await.franchise(id, true))
    }

    async fn delete_franchise(&self, id: FranchiseId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.franchises.remove(&id).is_none() {
            return Ok(false);
        }
        tables.stores.retain(|_, s| s.franchise_id != id);
        for record in tables.users.values_mut() {
            record.user.roles.remove_franchise(id);
        }
        Ok(true)
    }

    async fn create_store(
        &self,
        franchise: FranchiseId,
        name: &str,
    ) -> Result<Store, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.franchises.contains_key(&franchise) {
            return Err(RepositoryError::NotFound);
        }

        let store = Store {
            id: StoreId::new(tables.next_id()),
            franchise_id: franchise,
            name: name.to_owned(),
            total_revenue: None,
        };
        tables.stores.insert(store.id, store.clone());
        Ok(store)
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.tables.read().await.stores.get(&id).cloned())
    }

    async fn delete_store(
        &self,
        franchise: FranchiseId,
        store: StoreId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let belongs = tables
            .stores
            .get(&store)
            .is_some_and(|s| s.franchise_id == franchise);
        if belongs {
            tables.stores.remove(&store);
        }
        Ok(belongs)
    }
}

#[async_trait]
impl MenuCatalog for MemoryDatabase {
    async fn list_menu(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        Ok(self.tables.read().await.menu.values().cloned().collect())
    }

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, RepositoryError> {
        let mut tables = self.tables.write().await;
        let created = MenuItem {
            id: MenuItemId::new(tables.next_id()),
            title: item.title,
            description: item.description,
            image: item.image,
            price: item.price,
        };
        tables.menu.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        Ok(self.tables.read().await.menu.get(&id).cloned())
    }
}

#[async_trait]
impl OrderLedger for MemoryDatabase {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let created = Order {
            id: OrderId::new(tables.next_id()),
            diner_id: order.diner_id,
            franchise_id: order.franchise_id,
            store_id: order.store_id,
            date: Utc::now(),
            items: order.items,
        };
        tables.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_orders(
        &self,
        diner: UserId,
        page: u32,
        per_page: u32,
    ) -> Result<OrderPage, RepositoryError> {
        let tables = self.tables.read().await;
        let per_page = per_page as usize;

        let mut owned = tables
            .orders
            .values()
            .filter(|o| o.diner_id == diner)
            .skip(page as usize * per_page);

        let orders: Vec<Order> = owned.by_ref().take(per_page).cloned().collect();
        let more = owned.next().is_some();

        Ok(OrderPage {
            diner_id: diner,
            orders,
            page,
            more,
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
