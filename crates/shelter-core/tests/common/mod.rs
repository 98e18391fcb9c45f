#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shelter_core::{
    ApplicationDraft, ApplicationRecord, ApplicationRepository, ApplicationScheduler,
    CalendarEvent, CalendarGateway, GatewayError, RecurrencePolicy, RepositoryError,
    SchedulerSettings,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarCall {
    Create(CalendarEvent),
    Update(String),
    Delete(String),
}

#[derive(Debug, Clone, Copy)]
pub enum CreateBehaviour {
    Succeed(&'static str),
    Fail,
    Hang,
}

/// Calendar double that records every call in order.
pub struct RecordingCalendar {
    create: CreateBehaviour,
    fail_delete: bool,
    calls: Mutex<Vec<CalendarCall>>,
}

impl RecordingCalendar {
    pub fn new(create: CreateBehaviour) -> Self {
        Self {
            create,
            fail_delete: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(event_id: &'static str) -> Arc<Self> {
        Arc::new(Self::new(CreateBehaviour::Succeed(event_id)))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(CreateBehaviour::Fail))
    }

    pub fn with_failing_delete(mut self) -> Arc<Self> {
        self.fail_delete = true;
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_events(&self) -> Vec<CalendarEvent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CalendarCall::Create(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CalendarCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CalendarGateway for RecordingCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Create(event.clone()));
        match self.create {
            CreateBehaviour::Succeed(id) => Ok(id.to_string()),
            CreateBehaviour::Fail => Err(GatewayError::Status {
                status: 503,
                message: "backend unavailable".to_string(),
            }),
            CreateBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too-late".to_string())
            }
        }
    }

    async fn update_event(
        &self,
        event_id: &str,
        _event: &CalendarEvent,
    ) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Update(event_id.to_string()));
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Delete(event_id.to_string()));
        if self.fail_delete {
            return Err(GatewayError::Status {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoCall {
    Save(Uuid),
    Find(Uuid),
    Delete(Uuid),
    List(Uuid),
}

/// In-memory repository that records calls and can be told to fail on save.
#[derive(Default)]
pub struct MemoryRepository {
    records: Mutex<HashMap<Uuid, ApplicationRecord>>,
    fail_save: bool,
    calls: Mutex<Vec<RepoCall>>,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_saves() -> Arc<Self> {
        Arc::new(Self {
            fail_save: true,
            ..Self::default()
        })
    }

    pub fn insert(&self, record: ApplicationRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.records.lock().unwrap().contains_key(&id)
    }

    pub fn calls(&self) -> Vec<RepoCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RepoCall::Delete(_)))
            .count()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRepository {
    async fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.calls.lock().unwrap().push(RepoCall::Save(record.id));
        if self.fail_save {
            return Err(RepositoryError::message("disk full"));
        }
        self.insert(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.calls.lock().unwrap().push(RepoCall::Find(id));
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.calls.lock().unwrap().push(RepoCall::Delete(id));
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list_for_animal(
        &self,
        animal_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.calls.lock().unwrap().push(RepoCall::List(animal_id));
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.animal_id == animal_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(records)
    }
}

pub fn settings() -> SchedulerSettings {
    SchedulerSettings {
        gateway_timeout: Duration::from_millis(200),
        ..SchedulerSettings::default()
    }
}

pub fn scheduler(
    repository: Arc<dyn ApplicationRepository>,
    calendar: Arc<dyn CalendarGateway>,
) -> ApplicationScheduler {
    ApplicationScheduler::new(repository, calendar, settings())
}

/// A valid daily draft applied on 2024-03-10 at 09:00 UTC.
pub fn draft() -> ApplicationDraft {
    ApplicationDraft {
        medicine_id: Some(Uuid::new_v4()),
        user_id: Some(Uuid::new_v4()),
        animal_id: Some(Uuid::new_v4()),
        applied_at: Some(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()),
        quantity: "2".to_string(),
        recurrence: RecurrencePolicy::Daily,
        summary: Some("Amoxicillin for Luna".to_string()),
        ..ApplicationDraft::default()
    }
}

/// A stored record with no calendar link.
pub fn unlinked_record() -> ApplicationRecord {
    ApplicationRecord {
        id: Uuid::new_v4(),
        medicine_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        animal_id: Uuid::new_v4(),
        applied_at: Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
        quantity: 1.0,
        next_application_at: None,
        recurrence: RecurrencePolicy::NoRepeat,
        ends_at: None,
        external_event_ref: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 10, 9, 1, 0).unwrap(),
    }
}
