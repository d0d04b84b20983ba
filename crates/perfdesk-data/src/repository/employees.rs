use std::sync::Arc;

use perfdesk_core::types::{collections::EMPLOYEES, Employee, EmployeeUpdate, NewEmployee};
use serde_json::{json, Value};
use tracing::debug;

use crate::codec;
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;
use crate::subscription::{Callback, Subscription};

use super::{insert, typed};

#[derive(Clone)]
pub struct EmployeeRepository {
    resolver: Resolver,
}

impl EmployeeRepository {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub async fn list(&self) -> Result<Vec<Employee>> {
        let records = self.resolver.all(EMPLOYEES).await?;
        Ok(codec::decode_list(EMPLOYEES, records))
    }

    pub async fn get(&self, employee_id: &str) -> Result<Option<Employee>> {
        self.resolver
            .get(EMPLOYEES, employee_id)
            .await?
            .map(|value| codec::decode(EMPLOYEES, employee_id, value))
            .transpose()
    }

    /// The employee linked to an account. If several claim the same
    /// account, the one with the lowest key wins.
    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Employee>> {
        let records = self.resolver.find_where(EMPLOYEES, "userId", &json!(user_id)).await?;
        Ok(codec::decode_list(EMPLOYEES, records).into_iter().next())
    }

    pub async fn create(&self, employee: NewEmployee) -> Result<Employee> {
        insert(&self.resolver, EMPLOYEES, |id, now| employee.into_record(id, now)).await
    }

    pub async fn update(&self, employee_id: &str, update: EmployeeUpdate) -> Result<()> {
        let path = format!("{EMPLOYEES}/{employee_id}");
        let partial = update.into_partial(chrono::Utc::now())?;
        self.resolver
            .store()
            .merge_update(&path, partial)
            .await
            .log_failure(|| format!("Update {path}"))
    }

    pub async fn delete(&self, employee_id: &str) -> Result<()> {
        let path = format!("{EMPLOYEES}/{employee_id}");
        self.resolver
            .store()
            .delete(&path)
            .await
            .log_failure(|| format!("Delete {path}"))?;
        debug!(%employee_id, "Employee deleted");
        Ok(())
    }

    /// Follow one employee. `None` is delivered while the record is absent
    /// or unreadable.
    pub fn subscribe(&self, employee_id: &str, on_update: Callback<Option<Employee>>) -> Result<Subscription> {
        let key = employee_id.to_string();
        self.resolver.subscribe_record(
            EMPLOYEES,
            employee_id,
            Arc::new(move |record: Option<Value>| {
                let employee = record.and_then(|value| {
                    codec::decode_list::<Employee>(EMPLOYEES, vec![value]).into_iter().next()
                });
                if employee.is_none() {
                    debug!(employee_id = %key, "Employee absent");
                }
                on_update(employee);
            }),
        )
    }

    pub fn subscribe_all(&self, on_update: Callback<Vec<Employee>>) -> Result<Subscription> {
        self.resolver.subscribe_all(EMPLOYEES, typed(EMPLOYEES, on_update))
    }
}
