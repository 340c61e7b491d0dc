use chrono::{Duration as ChronoDuration, Utc};
use edu_media::{MediaKind, MediaStore};
use edu_metrics::TracingService;
use edu_models::{
    ActiveLesson, AnnouncementReport, AnnouncementRequest, CacheConfig, CreateUserRequest,
    CurrentLesson, EduError, EnterLessonRequest, ExitOutcome, Lesson, LessonDraft, LessonPatch,
    Serie, SerieDraft, SerieListQuery, SeriePatch, SubscriptionOutcome, SyncUserRequest,
    TabRequest, TrackingAck, TrackingConfig, UnsubscriptionOutcome, UpdateUserRequest,
    UploadedFile, User,
};
use edu_notify::{
    announcement_subject, new_lesson_message, new_lesson_subject, render_announcement_html,
    MailMessage, Mailer, Notifier,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::cache::{CachedBody, ResponseCache};
use crate::store::Store;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Files that came with a lesson create or update.
#[derive(Debug, Clone, Default)]
pub struct LessonMedia {
    pub video: Option<UploadedFile>,
    pub documents: Vec<UploadedFile>,
}

impl LessonMedia {
    fn video(&self) -> Option<&UploadedFile> {
        self.video.as_ref().filter(|f| !f.is_empty())
    }

    fn documents(&self) -> Vec<UploadedFile> {
        self.documents
            .iter()
            .filter(|f| !f.is_empty())
            .cloned()
            .collect()
    }
}

/// Application service behind the HTTP API.
pub struct Platform {
    store: Store,
    media: Arc<dyn MediaStore>,
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn Mailer>,
    cache: ResponseCache,
    tracking: TrackingConfig,
}

fn ensure_owner(serie: &Serie, caller: &str) -> Result<(), EduError> {
    if serie.serie_user != caller {
        return Err(EduError::forbidden(
            "Only the owner of this series can modify it",
        ));
    }
    Ok(())
}

fn to_body<T: Serialize>(value: &T) -> Result<Vec<u8>, EduError> {
    serde_json::to_vec(value).map_err(|e| EduError::internal(e.to_string()))
}

impl Platform {
    pub fn new(
        store: Store,
        media: Arc<dyn MediaStore>,
        notifier: Arc<dyn Notifier>,
        mailer: Arc<dyn Mailer>,
        cache: &CacheConfig,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            store,
            media,
            notifier,
            mailer,
            cache: ResponseCache::new(
                Duration::from_secs(cache.lessons_ttl_secs),
                cache.max_entries,
            ),
            tracking,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn upload_or_empty(&self, kind: MediaKind, file: Option<&UploadedFile>, user_id: &str) -> String {
        match file.filter(|f| !f.is_empty()) {
            Some(file) => self
                .media
                .upload(kind, file, user_id)
                .await
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    // Users

    pub async fn get_user(&self, user_id: &str) -> Result<User, EduError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| EduError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }

    #[instrument(skip(self, request))]
    pub async fn create_profile(&self, request: &CreateUserRequest) -> Result<User, EduError> {
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EduError::invalid("userId is required"))?;
        self.store
            .insert_user(user_id, &request.profile_fields())
            .await
    }

    /// Profile of the caller, created from token claims on first access.
    /// The flag is true when the profile was just created.
    pub async fn current_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(User, bool), EduError> {
        if let Some(user) = self.store.find_user(user_id).await? {
            return Ok((user, false));
        }
        let fields = UpdateUserRequest {
            name,
            email,
            ..Default::default()
        };
        let user = self.store.create_or_update_user(user_id, &fields).await?;
        info!(user_id = %user_id, "User profile created automatically");
        Ok((user, true))
    }

    /// Token identity wins over the body; the name falls back to the body.
    pub async fn sync_user(
        &self,
        user_id: &str,
        email: Option<String>,
        name: Option<String>,
        extra: SyncUserRequest,
    ) -> Result<User, EduError> {
        let fields = UpdateUserRequest {
            name: name.or(extra.name),
            email,
            username: None,
            gender: extra.gender,
            birthdate: extra.birthdate,
            avatar: extra.avatar,
        };
        self.store.create_or_update_user(user_id, &fields).await
    }

    pub async fn update_user(
        &self,
        caller: &str,
        user_id: &str,
        fields: &UpdateUserRequest,
    ) -> Result<User, EduError> {
        if caller != user_id {
            return Err(EduError::forbidden("You can only update your own profile"));
        }
        self.get_user(user_id).await?;
        self.store.update_user(user_id, fields).await
    }

    // Series

    #[instrument(skip(self, draft, thumbnail))]
    pub async fn create_serie(
        &self,
        draft: &SerieDraft,
        owner: &str,
        thumbnail: Option<&UploadedFile>,
    ) -> Result<Serie, EduError> {
        draft.validate()?;
        let thumbnail_url = self
            .upload_or_empty(MediaKind::Thumbnail, thumbnail, owner)
            .await;
        let mut serie = self.store.insert_serie(draft, owner, &thumbnail_url).await?;

        let topic = self
            .notifier
            .create_topic(&format!("serie_{}", serie.id))
            .await;
        self.store.set_serie_topic(&serie.id, &topic).await?;
        serie.serie_sns = Some(topic);

        TracingService::log_serie_created(&serie);
        Ok(serie)
    }

    pub async fn list_series(&self, query: &SerieListQuery) -> Result<Vec<Serie>, EduError> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(EduError::invalid("page must be at least 1"));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(EduError::invalid(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        self.store.list_series(page, limit, query.published).await
    }

    pub async fn get_serie(&self, serie_id: &str) -> Result<Serie, EduError> {
        self.store.require_serie(serie_id).await
    }

    pub async fn series_by_owner(&self, owner: &str) -> Result<Vec<Serie>, EduError> {
        self.store.series_by_owner(owner).await
    }

    pub async fn subscribed_series(&self, user_id: &str) -> Result<Vec<Serie>, EduError> {
        self.store.series_subscribed_by(user_id).await
    }

    pub async fn search_series(&self, keyword: Option<&str>) -> Result<Vec<Serie>, EduError> {
        let keyword = keyword
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EduError::invalid("Missing search keyword"))?;
        self.store.search_series(keyword).await
    }

    /// `None` when the series does not exist.
    #[instrument(skip(self, patch, thumbnail))]
    pub async fn update_serie(
        &self,
        serie_id: &str,
        patch: &SeriePatch,
        caller: &str,
        thumbnail: Option<&UploadedFile>,
    ) -> Result<Option<Serie>, EduError> {
        patch.validate()?;
        let Some(current) = self.store.find_serie(serie_id).await? else {
            return Ok(None);
        };
        ensure_owner(&current, caller)?;

        let mut new_thumbnail = None;
        if let Some(file) = thumbnail.filter(|f| !f.is_empty()) {
            if !current.serie_thumbnail.is_empty() {
                self.media.delete(&current.serie_thumbnail).await;
            }
            new_thumbnail = Some(
                self.media
                    .upload(MediaKind::Thumbnail, file, caller)
                    .await
                    .unwrap_or_default(),
            );
        }

        self.store
            .update_serie(serie_id, patch, new_thumbnail.as_deref())
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_serie(&self, serie_id: &str, caller: &str) -> Result<(), EduError> {
        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;
        let serie = self.store.delete_serie(serie_id).await?;

        if let Some(topic) = serie.serie_sns.as_deref() {
            self.notifier.delete_topic(topic).await;
        }
        if !serie.serie_thumbnail.is_empty() {
            self.media.delete(&serie.serie_thumbnail).await;
        }
        self.cache.invalidate_serie(serie_id);
        TracingService::log_serie_deleted(serie_id);
        Ok(())
    }

    /// Series that can take subscriptions: it exists and has a topic.
    async fn subscribable(&self, serie_id: &str) -> Result<(Serie, String), EduError> {
        let serie = self.store.require_serie(serie_id).await?;
        match serie.serie_sns.clone() {
            Some(topic) => Ok((serie, topic)),
            None => Err(EduError::SerieNotFound {
                serie_id: serie_id.to_string(),
            }),
        }
    }

    #[instrument(skip(self, email))]
    pub async fn subscribe_serie(
        &self,
        serie_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<SubscriptionOutcome, EduError> {
        let (_, topic) = self.subscribable(serie_id).await?;
        self.get_user(user_id).await?;

        if !self.store.subscribe(serie_id, user_id).await? {
            return Ok(SubscriptionOutcome {
                message: "You are already subscribed to this series".to_string(),
                already_subscribed: true,
            });
        }
        self.notifier.subscribe(&topic, email).await;
        TracingService::log_subscription_changed(serie_id, user_id, true);
        Ok(SubscriptionOutcome {
            message: "Subscribed".to_string(),
            already_subscribed: false,
        })
    }

    /// The topic is left first. A subscription still waiting for email
    /// confirmation cannot be removed there, and then the store is left as is.
    #[instrument(skip(self, email))]
    pub async fn unsubscribe_serie(
        &self,
        serie_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<UnsubscriptionOutcome, EduError> {
        let (_, topic) = self.subscribable(serie_id).await?;

        let outcome = self.notifier.unsubscribe(&topic, email).await;
        if outcome.pending_confirmation {
            return Ok(UnsubscriptionOutcome {
                message: Some(
                    "Subscription is pending confirmation and cannot be removed yet".to_string(),
                ),
                pending_confirmation: true,
            });
        }

        self.get_user(user_id).await?;
        let removed = self.store.unsubscribe(serie_id, user_id).await?;
        if removed {
            TracingService::log_subscription_changed(serie_id, user_id, false);
        }
        Ok(UnsubscriptionOutcome {
            message: Some(if removed {
                "Unsubscribed successfully".to_string()
            } else {
                "You are not subscribed to this series".to_string()
            }),
            pending_confirmation: false,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn notify_subscribers(
        &self,
        serie_id: &str,
        caller: &str,
        request: &AnnouncementRequest,
    ) -> Result<AnnouncementReport, EduError> {
        let required = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let (Some(title), Some(message)) = (required(&request.title), required(&request.message))
        else {
            return Err(EduError::invalid(
                "Announcement title and message are required",
            ));
        };

        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;

        let recipients = self.store.subscriber_emails(serie_id).await?;
        if recipients.is_empty() {
            return Ok(AnnouncementReport {
                success: true,
                message: Some("No subscribers to notify for this series".to_string()),
                recipient_count: None,
                message_ids: None,
            });
        }

        let mail = MailMessage {
            subject: announcement_subject(&serie.serie_title, &title),
            html: Some(render_announcement_html(&serie.serie_title, &title, &message)),
            text: message,
            recipients,
        };
        match self.mailer.send(&mail).await {
            Ok(message_ids) => {
                TracingService::log_announcement_sent(
                    serie_id,
                    mail.recipients.len(),
                    message_ids.len(),
                );
                Ok(AnnouncementReport {
                    success: true,
                    message: None,
                    recipient_count: Some(mail.recipients.len()),
                    message_ids: Some(message_ids),
                })
            }
            Err(e) => {
                TracingService::log_announcement_failed(serie_id, &e);
                Err(e)
            }
        }
    }

    // Lessons

    #[instrument(skip(self, draft, media))]
    pub async fn create_lesson(
        &self,
        serie_id: &str,
        draft: &LessonDraft,
        caller: &str,
        media: &LessonMedia,
    ) -> Result<Lesson, EduError> {
        draft.validate()?;
        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;

        let video = self
            .upload_or_empty(MediaKind::Video, media.video(), caller)
            .await;
        if media.video().is_some() && video.is_empty() {
            warn!(serie_id = %serie_id, "Lesson video upload failed, continuing without it");
        }
        let documents = self
            .media
            .upload_documents(&media.documents(), caller)
            .await;

        let lesson = self
            .store
            .insert_lesson(serie_id, draft, &video, &documents)
            .await?;
        self.cache.invalidate_serie(serie_id);

        if let Some(topic) = serie.serie_sns.as_deref() {
            self.notifier
                .publish(
                    topic,
                    &new_lesson_subject(&serie.serie_title),
                    &new_lesson_message(&serie.serie_title, &lesson.lesson_title),
                )
                .await;
        }
        TracingService::log_lesson_created(&lesson);
        Ok(lesson)
    }

    /// Serialized lesson list of a series, served from the cache when fresh.
    pub async fn lessons_response(&self, serie_id: &str) -> Result<Arc<CachedBody>, EduError> {
        let key = ResponseCache::lessons_key(serie_id);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let generation = self.cache.generation(serie_id);
        let lessons = self.store.lessons_by_serie(serie_id).await?;
        Ok(self
            .cache
            .insert_if_current(key, serie_id, generation, to_body(&lessons)?))
    }

    pub async fn lesson_response(
        &self,
        serie_id: &str,
        lesson_id: &str,
    ) -> Result<Arc<CachedBody>, EduError> {
        let key = ResponseCache::lesson_key(serie_id, lesson_id);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let generation = self.cache.generation(serie_id);
        let lesson = self
            .store
            .find_lesson(serie_id, lesson_id)
            .await?
            .ok_or_else(|| EduError::LessonNotFound {
                lesson_id: lesson_id.to_string(),
            })?;
        Ok(self
            .cache
            .insert_if_current(key, serie_id, generation, to_body(&lesson)?))
    }

    /// `None` when the lesson is not part of the series.
    #[instrument(skip(self, patch, media))]
    pub async fn update_lesson(
        &self,
        serie_id: &str,
        lesson_id: &str,
        patch: &LessonPatch,
        caller: &str,
        media: &LessonMedia,
    ) -> Result<Option<Lesson>, EduError> {
        patch.validate()?;
        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;
        let Some(current) = self.store.find_lesson(serie_id, lesson_id).await? else {
            return Ok(None);
        };

        let mut video = None;
        if let Some(file) = media.video() {
            if !current.lesson_video.is_empty() {
                self.media.delete(&current.lesson_video).await;
            }
            video = self.media.upload(MediaKind::Video, file, caller).await;
        }

        let mut documents = None;
        let new_documents = media.documents();
        if !new_documents.is_empty() {
            if !current.lesson_documents.is_empty() {
                let report = self.media.delete_batch(&current.lesson_documents).await;
                if !report.failed.is_empty() {
                    warn!(lesson_id = %lesson_id, failed = report.failed.len(), "Some old documents could not be deleted");
                }
            }
            let urls = self.media.upload_documents(&new_documents, caller).await;
            if !urls.is_empty() {
                documents = Some(urls);
            }
        }

        let updated = self
            .store
            .update_lesson(
                serie_id,
                lesson_id,
                patch,
                video.as_deref(),
                documents.as_deref(),
            )
            .await?;
        self.cache.invalidate_serie(serie_id);
        Ok(updated)
    }

    /// The row goes first, media after.
    #[instrument(skip(self))]
    pub async fn delete_lesson(
        &self,
        serie_id: &str,
        lesson_id: &str,
        caller: &str,
    ) -> Result<(), EduError> {
        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;
        let lesson = self.store.delete_lesson(serie_id, lesson_id).await?;
        self.cache.invalidate_serie(serie_id);

        if !lesson.lesson_video.is_empty() {
            self.media.delete(&lesson.lesson_video).await;
        }
        if !lesson.lesson_documents.is_empty() {
            self.media.delete_batch(&lesson.lesson_documents).await;
        }
        TracingService::log_lesson_deleted(serie_id, lesson_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_document(
        &self,
        serie_id: &str,
        lesson_id: &str,
        doc_url: Option<&str>,
        caller: &str,
    ) -> Result<(), EduError> {
        let doc_url = doc_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EduError::invalid("docUrl is required"))?;
        let serie = self.store.require_serie(serie_id).await?;
        ensure_owner(&serie, caller)?;

        self.store
            .remove_document(serie_id, lesson_id, doc_url)
            .await?;
        self.cache.invalidate_serie(serie_id);
        self.media.delete(doc_url).await;
        Ok(())
    }

    // Tracking

    fn stale_before(&self) -> chrono::DateTime<Utc> {
        Utc::now() - ChronoDuration::minutes(self.tracking.stale_after_mins)
    }

    pub async fn enter_lesson(&self, request: EnterLessonRequest) -> Result<TrackingAck, EduError> {
        let visit = request.into_visit()?;
        let tab = self.store.enter_lesson(&visit, self.stale_before()).await?;
        info!(
            user_id = %visit.user_id,
            tab_id = %tab.tab_id,
            lesson_id = %tab.lesson_id,
            "Current lesson set"
        );
        Ok(TrackingAck {
            user_id: visit.user_id,
            lesson_id: tab.lesson_id,
            serie_id: tab.serie_id,
            lesson_title: tab.lesson_title,
            tab_id: tab.tab_id,
        })
    }

    pub async fn exit_lesson(&self, request: TabRequest) -> Result<ExitOutcome, EduError> {
        let (user_id, tab_id) = request.into_parts()?;
        self.store.exit_lesson(&user_id, &tab_id).await
    }

    pub async fn focus_lesson(&self, request: TabRequest) -> Result<ActiveLesson, EduError> {
        let (user_id, tab_id) = request.into_parts()?;
        self.store.focus_lesson(&user_id, &tab_id).await
    }

    pub async fn current_lesson(&self, user_id: &str) -> Result<CurrentLesson, EduError> {
        let Some(snapshot) = self.store.tracking_snapshot(user_id).await? else {
            return Ok(CurrentLesson::idle(user_id));
        };
        let Some(current) = snapshot.current().cloned() else {
            return Ok(CurrentLesson::idle(user_id));
        };

        let lesson_data = self
            .store
            .find_lesson(&current.serie_id, &current.lesson_id)
            .await?;
        Ok(CurrentLesson {
            user_id: user_id.to_string(),
            lesson_id: Some(current.lesson_id),
            serie_id: Some(current.serie_id),
            lesson_title: current.lesson_title,
            last_updated: Some(snapshot.last_updated),
            is_in_lesson: true,
            total_active_tabs: snapshot.tabs.len(),
            active_lessons: snapshot.tabs,
            lesson_data,
        })
    }

    /// Periodically drops stale lesson tabs and expired cache entries.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let platform = Arc::clone(self);
        let period = Duration::from_secs(platform.tracking.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            info!("Starting maintenance loop every {:?}", period);
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                platform.run_maintenance_cycle().await;
            }
        })
    }

    pub async fn run_maintenance_cycle(&self) {
        match self.store.purge_stale_tabs(self.stale_before()).await {
            Ok(removed) => TracingService::log_stale_tabs_removed(removed),
            Err(e) => error!("Stale tab sweep failed: {}", e),
        }
        self.cache.cleanup_expired();
    }
}
