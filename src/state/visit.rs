use super::AppState;
use crate::types::*;

impl AppState {
    /// Register a newly mounted AR visit
    pub async fn start_visit(&self, user_id: UserId, totem_code: TotemCode) -> ArVisit {
        let visit = ArVisit {
            id: ulid::Ulid::new().to_string(),
            user_id,
            totem_code,
            started_at: chrono::Utc::now().to_rfc3339(),
        };

        self.visits
            .write()
            .await
            .insert(visit.id.clone(), visit.clone());
        tracing::info!(visit_id = %visit.id, totem_code = %visit.totem_code, "AR visit started");
        visit
    }

    /// Remove a visit once its screen has closed
    pub async fn finish_visit(&self, id: &VisitId) -> Option<ArVisit> {
        let visit = self.visits.write().await.remove(id);
        if visit.is_some() {
            tracing::info!(visit_id = %id, "AR visit finished");
        }
        visit
    }

    /// Live visits, oldest first
    pub async fn list_visits(&self) -> Vec<ArVisit> {
        let mut visits: Vec<ArVisit> = self.visits.read().await.values().cloned().collect();
        visits.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        visits
    }
}
