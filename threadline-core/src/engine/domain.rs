use crate::error::Result;
use crate::models::{ActionStatus, Tally, Task, ThreadItem, ThreadKind, ThreadType, User};
use crate::store::{Filter, RecordStore};

use super::Engine;

impl<S: RecordStore> Engine<S> {
    /// The local user, created on first run. New thread items are attributed
    /// to it.
    pub async fn ensure_user(&mut self, name: &str) -> Result<User> {
        if self.cache.users.is_empty() {
            self.fetch::<User>(Filter::All).await?;
        }
        let existing = self.cache.users.iter().next().cloned();
        let user = match existing {
            Some(user) => user,
            None => {
                let user = self.add(User::new(name)).await?;
                tracing::info!("Created user {}", user.name);
                user
            }
        };
        self.author_id = user.id.clone();
        Ok(user)
    }

    pub async fn record_success<T: Tally>(&mut self, id: &str) -> Result<T> {
        self.update_with(id, |item: &mut T| *item.success_count_mut() += 1)
            .await
    }

    pub async fn record_failure<T: Tally>(&mut self, id: &str) -> Result<T> {
        self.update_with(id, |item: &mut T| *item.failure_count_mut() += 1)
            .await
    }

    pub async fn toggle_task(&mut self, id: &str) -> Result<Task> {
        self.update_with(id, |task: &mut Task| task.status = task.status.toggled())
            .await
    }

    /// Mark an Action item completed now. Other variants are left as they are.
    pub async fn complete_action(&mut self, id: &str) -> Result<ThreadItem> {
        let now = self.clock.now();
        self.update_with(id, |item: &mut ThreadItem| {
            if let ThreadKind::Action {
                status,
                completed_at,
                ..
            } = &mut item.kind
            {
                *status = ActionStatus::Completed;
                *completed_at = Some(now);
            }
        })
        .await
    }

    /// Mark a Bottleneck item resolved. Other variants are left as they are.
    pub async fn resolve_bottleneck(&mut self, id: &str) -> Result<ThreadItem> {
        self.update_with(id, |item: &mut ThreadItem| {
            if let ThreadKind::Bottleneck { is_resolved } = &mut item.kind {
                *is_resolved = true;
            }
        })
        .await
    }

    /// Switch an item's variant. Fields of the old variant are dropped.
    pub async fn change_thread_type(&mut self, id: &str, ty: ThreadType) -> Result<ThreadItem> {
        self.update_with(id, |item: &mut ThreadItem| item.change_type(ty))
            .await
    }
}
