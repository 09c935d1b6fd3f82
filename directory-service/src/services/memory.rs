//! In-memory principal store for tests and local experiments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{PrincipalStore, ServiceError};
use crate::models::{
    Admin, Department, Experience, JobGroup, Level, NewAdmin, NewUser, PrincipalKind,
    StoredTokenPair, User, UserListing,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    admins: BTreeMap<i64, Admin>,
    users: BTreeMap<i64, User>,
    departments: BTreeMap<i64, Department>,
    job_groups: BTreeMap<i64, JobGroup>,
    levels: BTreeMap<i64, Level>,
    experiences: BTreeMap<i64, Experience>,
    admin_pairs: HashMap<i64, StoredTokenPair>,
    user_pairs: HashMap<i64, StoredTokenPair>,
    /// (admin_id, user_id) in insertion order
    favorites: Vec<(i64, i64)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn pairs(&mut self, kind: PrincipalKind) -> &mut HashMap<i64, StoredTokenPair> {
        match kind {
            PrincipalKind::Admin => &mut self.admin_pairs,
            PrincipalKind::User => &mut self.user_pairs,
        }
    }

    fn listing(&self, u: &User) -> Option<UserListing> {
        let department = self.departments.get(&u.department_id)?;
        let job_group = self.job_groups.get(&u.job_group_id)?;
        Some(UserListing {
            id: u.id,
            employee_id: u.employee_id.clone(),
            name: u.name.clone(),
            department_id: u.department_id,
            department_name: department.name.clone(),
            job_group_id: u.job_group_id,
            job_group_name: job_group.name.clone(),
            permission_code: u.permission_code.clone(),
            created_utc: u.created_utc,
            last_login_utc: u.last_login_utc,
        })
    }
}

/// Mirrors the Postgres schema's unique, foreign-key and cascade rules.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|e| ServiceError::Database(anyhow::anyhow!("In-memory store mutex poisoned: {}", e)))
    }

    /// Number of persisted token pairs for `kind`.
    pub fn token_pair_count(&self, kind: PrincipalKind) -> usize {
        self.lock().map(|mut t| t.pairs(kind).len()).unwrap_or(0)
    }
}

#[async_trait]
impl PrincipalStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_admin_by_id(&self, id: i64) -> Result<Option<Admin>, ServiceError> {
        Ok(self.lock()?.admins.get(&id).cloned())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin, ServiceError> {
        let mut tables = self.lock()?;
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(ServiceError::Conflict("Admin already exists".to_string()));
        }

        let id = tables.next_id();
        let admin = Admin {
            id,
            username: admin.username,
            password_hash: admin.password_hash,
            created_utc: Utc::now(),
        };
        tables.admins.insert(id, admin.clone());
        Ok(admin)
    }

    async fn find_user_by_employee_id(
        &self,
        employee_id: &str,
    ) -> Result<Option<User>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.employee_id == employee_id)
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.employee_id == user.employee_id) {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }
        if !tables.departments.contains_key(&user.department_id)
            || !tables.job_groups.contains_key(&user.job_group_id)
        {
            return Err(ServiceError::NotFound(
                "User references a record that does not exist".to_string(),
            ));
        }

        let id = tables.next_id();
        let user = User {
            id,
            employee_id: user.employee_id,
            name: user.name,
            password_hash: user.password_hash,
            department_id: user.department_id,
            job_group_id: user.job_group_id,
            permission_code: user.tier.as_code().to_string(),
            created_utc: Utc::now(),
            last_login_utc: None,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<UserListing>, ServiceError> {
        let tables = self.lock()?;
        let skip = usize::try_from(skip.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        Ok(tables
            .users
            .values()
            .filter_map(|u| tables.listing(u))
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn delete_user(&self, employee_id: &str) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let Some(id) = tables
            .users
            .values()
            .find(|u| u.employee_id == employee_id)
            .map(|u| u.id)
        else {
            return Ok(false);
        };

        tables.users.remove(&id);
        tables.user_pairs.remove(&id);
        tables.experiences.retain(|_, e| e.user_id != id);
        tables.favorites.retain(|&(_, user_id)| user_id != id);
        Ok(true)
    }

    async fn insert_department(&self, name: &str) -> Result<Department, ServiceError> {
        let mut tables = self.lock()?;
        if tables.departments.values().any(|d| d.name == name) {
            return Err(ServiceError::Conflict("Department already exists".to_string()));
        }

        let id = tables.next_id();
        let department = Department {
            id,
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        tables.departments.insert(id, department.clone());
        Ok(department)
    }

    async fn find_department_by_id(&self, id: i64) -> Result<Option<Department>, ServiceError> {
        Ok(self.lock()?.departments.get(&id).cloned())
    }

    async fn list_departments(&self) -> Result<Vec<Department>, ServiceError> {
        Ok(self.lock()?.departments.values().cloned().collect())
    }

    async fn insert_job_group(&self, name: &str) -> Result<JobGroup, ServiceError> {
        let mut tables = self.lock()?;
        if tables.job_groups.values().any(|j| j.name == name) {
            return Err(ServiceError::Conflict("Job group already exists".to_string()));
        }

        let id = tables.next_id();
        let job_group = JobGroup {
            id,
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        tables.job_groups.insert(id, job_group.clone());
        Ok(job_group)
    }

    async fn find_job_group_by_id(&self, id: i64) -> Result<Option<JobGroup>, ServiceError> {
        Ok(self.lock()?.job_groups.get(&id).cloned())
    }

    async fn list_job_groups(&self) -> Result<Vec<JobGroup>, ServiceError> {
        Ok(self.lock()?.job_groups.values().cloned().collect())
    }

    async fn insert_level(
        &self,
        name: &str,
        total_required_experience: i64,
    ) -> Result<Level, ServiceError> {
        let mut tables = self.lock()?;
        if tables.levels.values().any(|l| l.name == name) {
            return Err(ServiceError::Conflict("Level already exists".to_string()));
        }

        let id = tables.next_id();
        let level = Level {
            id,
            name: name.to_string(),
            total_required_experience,
        };
        tables.levels.insert(id, level.clone());
        Ok(level)
    }

    async fn list_levels(&self) -> Result<Vec<Level>, ServiceError> {
        let mut levels: Vec<Level> = self.lock()?.levels.values().cloned().collect();
        levels.sort_by_key(|l| (l.total_required_experience, l.id));
        Ok(levels)
    }

    async fn insert_experience(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<Experience, ServiceError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&user_id) {
            return Err(ServiceError::NotFound(
                "Experience references a record that does not exist".to_string(),
            ));
        }

        let id = tables.next_id();
        let experience = Experience {
            id,
            user_id,
            amount,
            created_utc: Utc::now(),
        };
        tables.experiences.insert(id, experience.clone());
        Ok(experience)
    }

    async fn list_experiences_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Experience>, ServiceError> {
        Ok(self
            .lock()?
            .experiences
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_favorite(&self, admin_id: i64, user_id: i64) -> Result<(), ServiceError> {
        let mut tables = self.lock()?;
        if !tables.admins.contains_key(&admin_id) || !tables.users.contains_key(&user_id) {
            return Err(ServiceError::NotFound(
                "Favorite references a record that does not exist".to_string(),
            ));
        }
        if tables.favorites.contains(&(admin_id, user_id)) {
            return Err(ServiceError::Conflict("Favorite already exists".to_string()));
        }

        tables.favorites.push((admin_id, user_id));
        Ok(())
    }

    async fn list_favorites(&self, admin_id: i64) -> Result<Vec<UserListing>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .favorites
            .iter()
            .filter(|&&(a, _)| a == admin_id)
            .filter_map(|(_, user_id)| tables.users.get(user_id))
            .filter_map(|u| tables.listing(u))
            .collect())
    }

    async fn delete_favorite(&self, admin_id: i64, user_id: i64) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let before = tables.favorites.len();
        tables.favorites.retain(|&f| f != (admin_id, user_id));
        Ok(tables.favorites.len() < before)
    }

    async fn save_token_pair(
        &self,
        kind: PrincipalKind,
        pair: &StoredTokenPair,
    ) -> Result<(), ServiceError> {
        let mut tables = self.lock()?;
        let exists = match kind {
            PrincipalKind::Admin => tables.admins.contains_key(&pair.principal_id),
            PrincipalKind::User => tables.users.contains_key(&pair.principal_id),
        };
        if !exists {
            return Err(ServiceError::NotFound(
                "Token pair references a record that does not exist".to_string(),
            ));
        }

        if kind == PrincipalKind::User {
            if let Some(user) = tables.users.get_mut(&pair.principal_id) {
                user.last_login_utc = Some(pair.updated_utc);
            }
        }
        tables.pairs(kind).insert(pair.principal_id, pair.clone());
        Ok(())
    }

    async fn find_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<Option<StoredTokenPair>, ServiceError> {
        Ok(self.lock()?.pairs(kind).get(&principal_id).cloned())
    }

    async fn replace_access_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
        refresh_token_hash: &str,
        access_token_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        match tables.pairs(kind).get_mut(&principal_id) {
            Some(pair) if pair.refresh_token_hash == refresh_token_hash => {
                pair.access_token_hash = access_token_hash.to_string();
                pair.updated_utc = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<bool, ServiceError> {
        Ok(self.lock()?.pairs(kind).remove(&principal_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tier, TokenPair};

    async fn seeded() -> (InMemoryStore, User) {
        let store = InMemoryStore::new();
        let department = store.insert_department("Platform").await.unwrap();
        let job_group = store.insert_job_group("Engineer").await.unwrap();
        let user = store
            .insert_user(NewUser {
                employee_id: "E001".to_string(),
                name: "Kim".to_string(),
                password_hash: "hash".to_string(),
                department_id: department.id,
                job_group_id: job_group.id,
                tier: Tier::Leader,
            })
            .await
            .unwrap();
        (store, user)
    }

    fn stored(principal_id: i64, access: &str, refresh: &str) -> StoredTokenPair {
        StoredTokenPair::from_pair(
            principal_id,
            &TokenPair {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_duplicate_keys_conflict() {
        let (store, user) = seeded().await;

        let err = store
            .insert_user(NewUser {
                employee_id: user.employee_id.clone(),
                name: "Lee".to_string(),
                password_hash: "hash".to_string(),
                department_id: user.department_id,
                job_group_id: user.job_group_id,
                tier: Tier::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = store.insert_department("Platform").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dangling_reference_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .insert_user(NewUser {
                employee_id: "E404".to_string(),
                name: "Nobody".to_string(),
                password_hash: "hash".to_string(),
                department_id: 99,
                job_group_id: 98,
                tier: Tier::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_overwrites_and_stamps_last_login() {
        let (store, user) = seeded().await;

        store
            .save_token_pair(PrincipalKind::User, &stored(user.id, "a1", "r1"))
            .await
            .unwrap();
        store
            .save_token_pair(PrincipalKind::User, &stored(user.id, "a2", "r2"))
            .await
            .unwrap();

        assert_eq!(store.token_pair_count(PrincipalKind::User), 1);
        let pair = store
            .find_token_pair(PrincipalKind::User, user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(pair.access_matches("a2"));

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert!(user.last_login_utc.is_some());
    }

    #[tokio::test]
    async fn test_replace_access_requires_current_refresh() {
        let (store, user) = seeded().await;
        let pair = stored(user.id, "a1", "r1");
        store
            .save_token_pair(PrincipalKind::User, &pair)
            .await
            .unwrap();

        let stale = crate::models::hash_token("r0");
        assert!(!store
            .replace_access_token(PrincipalKind::User, user.id, &stale, "x")
            .await
            .unwrap());
        assert!(store
            .replace_access_token(PrincipalKind::User, user.id, &pair.refresh_token_hash, "x")
            .await
            .unwrap());
        // Same id under the other kind has no pair
        assert!(!store
            .replace_access_token(PrincipalKind::Admin, user.id, &pair.refresh_token_hash, "x")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let (store, user) = seeded().await;
        store
            .save_token_pair(PrincipalKind::User, &stored(user.id, "a", "r"))
            .await
            .unwrap();
        store.insert_experience(user.id, 10).await.unwrap();

        assert!(store.delete_user("E001").await.unwrap());
        assert!(!store.delete_user("E001").await.unwrap());
        assert_eq!(store.token_pair_count(PrincipalKind::User), 0);
        assert!(store
            .list_experiences_for_user(user.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_favorites_are_per_admin_and_cascade() {
        let (store, user) = seeded().await;
        let admin = store
            .insert_admin(NewAdmin {
                username: "root".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        store.insert_favorite(admin.id, user.id).await.unwrap();
        assert!(matches!(
            store.insert_favorite(admin.id, user.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            store.insert_favorite(admin.id, 999).await,
            Err(ServiceError::NotFound(_))
        ));

        let favorites = store.list_favorites(admin.id).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].department_name, "Platform");
        assert!(store.list_favorites(999).await.unwrap().is_empty());

        assert!(store.delete_user("E001").await.unwrap());
        assert!(store.list_favorites(admin.id).await.unwrap().is_empty());
        assert!(!store.delete_favorite(admin.id, user.id).await.unwrap());
    }
}
