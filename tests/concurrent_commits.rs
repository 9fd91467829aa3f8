//! Two staging areas on one project, standing in for two processes
//!
//! Each `StagingArea` opens its own handle on the commit lock file, so the
//! advisory locks interact exactly as they would across processes.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::thread::JoinHandle;

use archstage::domain::{Element, ElementId, Layer, LayerMap};
use archstage::staging::{RecoveryOutcome, StagingArea};
use archstage::storage::{BaseStore, ModelStore, Project};
use archstage::{ChangesetId, ChangesetStatus, CommitOptions, Edit};
use tempfile::TempDir;

fn id(s: &str) -> ElementId {
    s.parse().unwrap()
}

fn cs(s: &str) -> ChangesetId {
    s.parse().unwrap()
}

fn setup() -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let project = Project::init(dir.path()).unwrap();
    (dir, project)
}

/// A model store that runs a hook right after its first layer write
struct PausingStore<F: Fn()> {
    inner: ModelStore,
    writes: Cell<usize>,
    after_first_write: F,
}

impl<F: Fn()> PausingStore<F> {
    fn new(project: &Project, after_first_write: F) -> Self {
        Self {
            inner: project.model_store(),
            writes: Cell::new(0),
            after_first_write,
        }
    }
}

impl<F: Fn()> BaseStore for PausingStore<F> {
    fn read_layer(&self, layer: Layer) -> anyhow::Result<LayerMap> {
        self.inner.read_layer(layer)
    }

    fn write_layer(&self, layer: Layer, elements: &LayerMap) -> anyhow::Result<()> {
        self.inner.write_layer(layer, elements)?;
        self.writes.set(self.writes.get() + 1);
        if self.writes.get() == 1 {
            (self.after_first_write)();
        }
        Ok(())
    }
}

fn open_with<F: Fn()>(project: &Project, store: PausingStore<F>) -> StagingArea<PausingStore<F>> {
    StagingArea::open(
        store,
        project.changeset_store(),
        project.journal(),
        &project.config().project,
    )
    .unwrap()
}

#[test]
fn opening_during_a_commit_does_not_roll_it_back() {
    let (dir, project) = setup();
    let root: PathBuf = dir.path().to_path_buf();
    let seen: RefCell<Option<Option<RecoveryOutcome>>> = RefCell::new(None);

    let store = PausingStore::new(&project, || {
        let other = Project::open(&root).unwrap();
        let area = StagingArea::for_project(&other).unwrap();
        *seen.borrow_mut() = Some(area.recover().unwrap());
    });
    let mut area = open_with(&project, store);

    let changeset = cs("two-layers");
    area.create_changeset(changeset.clone(), None, None).unwrap();
    area.stage(&changeset, Edit::Add(Element::new(id("api.operation.a"), "A")))
        .unwrap();
    area.stage(&changeset, Edit::Add(Element::new(id("business.service.b"), "B")))
        .unwrap();

    let report = area.commit(&changeset, CommitOptions::default()).unwrap();
    assert_eq!(report.changeset.status, ChangesetStatus::Committed);

    // The second opener saw the journal but left it to the running commit
    assert_eq!(*seen.borrow(), Some(None));

    let model = project.model_store().read_model().unwrap();
    assert!(model.contains(&id("api.operation.a")));
    assert!(model.contains(&id("business.service.b")));
    assert!(!project.journal().path().exists());
}

#[test]
fn commits_of_disjoint_elements_in_one_layer_both_survive() {
    let (dir, project) = setup();
    let root: PathBuf = dir.path().to_path_buf();

    // The second commit starts while the first is halfway through its writes
    let racer: RefCell<Option<JoinHandle<ChangesetStatus>>> = RefCell::new(None);
    let store = PausingStore::new(&project, || {
        let root = root.clone();
        *racer.borrow_mut() = Some(std::thread::spawn(move || {
            let project = Project::open(&root).unwrap();
            let mut area = StagingArea::for_project(&project).unwrap();
            let report = area.commit(&cs("second"), CommitOptions::default()).unwrap();
            report.changeset.status
        }));
    });
    let mut first = open_with(&project, store);
    let mut second = StagingArea::for_project(&project).unwrap();

    // Both changesets start from the same empty model
    first.create_changeset(cs("first"), None, None).unwrap();
    second.create_changeset(cs("second"), None, None).unwrap();
    first
        .stage(&cs("first"), Edit::Add(Element::new(id("api.operation.list-users"), "List")))
        .unwrap();
    first
        .stage(&cs("first"), Edit::Add(Element::new(id("data-model.entity.user"), "User")))
        .unwrap();
    second
        .stage(&cs("second"), Edit::Add(Element::new(id("api.operation.get-user"), "Get")))
        .unwrap();
    drop(second);

    let report = first.commit(&cs("first"), CommitOptions::default()).unwrap();
    assert_eq!(report.changeset.status, ChangesetStatus::Committed);

    let racer = racer.borrow_mut().take().expect("second commit was started");
    assert_eq!(racer.join().unwrap(), ChangesetStatus::Committed);

    let model = project.model_store().read_model().unwrap();
    assert!(model.contains(&id("api.operation.list-users")));
    assert!(model.contains(&id("api.operation.get-user")));
    assert!(model.contains(&id("data-model.entity.user")));
    assert!(!project.journal().path().exists());
}
