//! Shared fixtures: a scripted in-memory XR runtime and recording collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

use totem_ar::ar::{ArScreen, ExitCallback, OverlayEvent, SceneState, ScreenOutcome};
use totem_ar::handoff::TriviaHandoff;
use totem_ar::trivia::{TriviaApi, TriviaError, TriviaResult};
use totem_ar::types::{
    AnswerSubmission, HitTestSource, HitTestSourceId, Outcome, Question, QuestionLookup,
    ReferenceSpace, ReferenceSpaceKind, SpaceId, SpecialState, Transform,
};
use totem_ar::xr::{HitTestResult, SpacePose, XrError, XrEvent, XrFrame, XrResult, XrSession};

pub const FLOOR_SPACE: SpaceId = 1;
pub const LOCAL_SPACE: SpaceId = 2;
pub const VIEWER_SPACE: SpaceId = 3;
pub const SOURCE_ID: HitTestSourceId = 10;

/// What the scripted runtime grants
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub bind: bool,
    pub floor: bool,
    pub local: bool,
    pub hit_test: bool,
}

impl Script {
    pub fn full() -> Self {
        Self {
            bind: true,
            floor: true,
            local: true,
            hit_test: true,
        }
    }
}

pub struct ScriptedSession {
    script: Script,
    /// When set, hit-test source requests wait for a notification
    hit_test_gate: Option<Arc<Notify>>,
    events: mpsc::Sender<XrEvent>,
    pub space_requests: Mutex<Vec<ReferenceSpaceKind>>,
    pub cancels: AtomicUsize,
    pub ends: AtomicUsize,
    pub selects: AtomicUsize,
}

impl ScriptedSession {
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn requested_spaces(&self) -> Vec<ReferenceSpaceKind> {
        self.space_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl XrSession for ScriptedSession {
    async fn bind_surface(&self) -> XrResult<()> {
        if self.script.bind {
            Ok(())
        } else {
            Err(XrError::NotSupported("surface binding".to_string()))
        }
    }

    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> XrResult<ReferenceSpace> {
        self.space_requests.lock().unwrap().push(kind);
        let (granted, id) = match kind {
            ReferenceSpaceKind::LocalFloor => (self.script.floor, FLOOR_SPACE),
            ReferenceSpaceKind::Local => (self.script.local, LOCAL_SPACE),
            ReferenceSpaceKind::Viewer => (true, VIEWER_SPACE),
        };
        if granted {
            Ok(ReferenceSpace { id, kind })
        } else {
            Err(XrError::Rejected(format!("{} not supported", kind)))
        }
    }

    async fn request_hit_test_source(&self, space: &ReferenceSpace) -> XrResult<HitTestSource> {
        if let Some(gate) = &self.hit_test_gate {
            gate.notified().await;
        }
        if self.script.hit_test {
            Ok(HitTestSource {
                id: SOURCE_ID,
                space: space.id,
            })
        } else {
            Err(XrError::NotSupported("hit-test".to_string()))
        }
    }

    fn cancel_hit_test_source(&self, _source: &HitTestSource) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn dispatch_select(&self) {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.try_send(XrEvent::Select);
    }

    fn end(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }

    fn is_ended(&self) -> bool {
        self.ends.load(Ordering::SeqCst) > 0
    }
}

#[derive(Default)]
pub struct RecordingHandoff {
    pub codes: Mutex<Vec<String>>,
}

impl RecordingHandoff {
    pub fn handed_off(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

impl TriviaHandoff for RecordingHandoff {
    fn hand_off(&self, totem_code: &str) {
        self.codes.lock().unwrap().push(totem_code.to_string());
    }
}

/// A mounted AR screen running on its own task
pub struct Visit {
    pub session: Arc<ScriptedSession>,
    pub handoff: Arc<RecordingHandoff>,
    pub exits: Arc<AtomicUsize>,
    pub xr: mpsc::Sender<XrEvent>,
    pub overlay: mpsc::Sender<OverlayEvent>,
    pub scene: watch::Receiver<SceneState>,
    pub task: JoinHandle<ScreenOutcome>,
}

impl Visit {
    pub fn exit_count(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }

    pub async fn frame(&self, frame: XrFrame) {
        self.xr.send(XrEvent::Frame(frame)).await.unwrap();
        settle().await;
    }

    pub async fn tap(&self) {
        self.overlay.send(OverlayEvent::Tap).await.unwrap();
        settle().await;
    }

    pub fn scene(&self) -> SceneState {
        self.scene.borrow().clone()
    }

    /// Wait for the screen task to return
    pub async fn finish(&mut self) -> ScreenOutcome {
        (&mut self.task).await.unwrap()
    }
}

pub fn mount(script: Script, totem_code: &str) -> Visit {
    mount_with_gate(script, totem_code, None)
}

pub fn mount_with_gate(script: Script, totem_code: &str, gate: Option<Arc<Notify>>) -> Visit {
    let (xr_tx, xr_rx) = mpsc::channel(64);
    let (overlay_tx, overlay_rx) = mpsc::channel(16);

    let session = Arc::new(ScriptedSession {
        script,
        hit_test_gate: gate,
        events: xr_tx.clone(),
        space_requests: Mutex::new(Vec::new()),
        cancels: AtomicUsize::new(0),
        ends: AtomicUsize::new(0),
        selects: AtomicUsize::new(0),
    });
    let handoff = Arc::new(RecordingHandoff::default());
    let exits = Arc::new(AtomicUsize::new(0));

    let counter = exits.clone();
    let on_exit: ExitCallback = Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let screen = ArScreen::new(
        session.clone(),
        totem_code.to_string(),
        on_exit,
        handoff.clone(),
    );
    let scene = screen.scene();
    let task = tokio::spawn(screen.run(xr_rx, overlay_rx));

    Visit {
        session,
        handoff,
        exits,
        xr: xr_tx,
        overlay: overlay_tx,
        scene,
        task,
    }
}

/// Let every spawned task run until it blocks. Needs a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn frame(seq: u64, hit: Option<(SpaceId, Transform)>) -> XrFrame {
    XrFrame {
        seq,
        presenting: true,
        results: hit
            .map(|(space, matrix)| {
                vec![HitTestResult {
                    source: SOURCE_ID,
                    poses: vec![SpacePose { space, matrix }],
                }]
            })
            .unwrap_or_default(),
    }
}

/// Trivia backend kept in memory: one question per totem, one answer per player and totem
pub struct InMemoryTrivia {
    questions: Vec<Question>,
    answered: Mutex<Vec<(String, String)>>,
    active: Mutex<bool>,
    pub reachable: bool,
}

impl InMemoryTrivia {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            answered: Mutex::new(Vec::new()),
            active: Mutex::new(true),
            reachable: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new(vec![])
        }
    }

    fn check_reachable(&self) -> TriviaResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(TriviaError::RequestFailed("connection refused".to_string()))
        }
    }
}

pub fn question(totem_code: &str) -> Question {
    Question {
        id: format!("q-{}", totem_code),
        totem_id: format!("t-{}", totem_code),
        totem_code: totem_code.to_string(),
        text: "¿Qué porcentaje de tus ingresos conviene ahorrar?".to_string(),
        options: vec!["5%".to_string(), "10%".to_string(), "50%".to_string()],
        category: Some("ahorro".to_string()),
    }
}

#[async_trait]
impl TriviaApi for InMemoryTrivia {
    async fn fetch_question(&self, user_id: &str, totem_code: &str) -> TriviaResult<QuestionLookup> {
        self.check_reachable()?;
        let played = self
            .answered
            .lock()
            .unwrap()
            .iter()
            .any(|(u, t)| u == user_id && t == totem_code);
        if played {
            return Ok(QuestionLookup::Special(SpecialState::AlreadyPlayed {
                message: Some("Ya respondiste esta trivia".to_string()),
            }));
        }
        Ok(self
            .questions
            .iter()
            .find(|q| q.totem_code == totem_code)
            .cloned()
            .map(QuestionLookup::Question)
            .unwrap_or(QuestionLookup::Special(SpecialState::NotFound)))
    }

    async fn submit_answer(&self, answer: &AnswerSubmission) -> TriviaResult<Outcome> {
        self.check_reachable()?;
        self.answered
            .lock()
            .unwrap()
            .push((answer.user_id.clone(), answer.totem_code.clone()));
        let correct = answer.option_index == 1;
        Ok(Outcome {
            correct,
            points: if correct { 10 } else { 0 },
            correct_index: Some(1),
            total_score: Some(if correct { 10 } else { 0 }),
            message: None,
        })
    }

    async fn app_status(&self) -> TriviaResult<bool> {
        self.check_reachable()?;
        Ok(*self.active.lock().unwrap())
    }

    async fn set_app_status(&self, active: bool) -> TriviaResult<bool> {
        self.check_reachable()?;
        *self.active.lock().unwrap() = active;
        Ok(active)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
