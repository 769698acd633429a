use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::*;
use crate::entity::Record;
use crate::error::StoreError;
use crate::store::lines::{MAX_LINE_ID, SEED_PEOPLE};
use crate::store::{LineFileStore, MemoryStore};
use crate::translate::{Person, PersonTranslator};

type MemoryCache = Cache<Person, Arc<MemoryStore>, PersonTranslator>;

fn seed_records() -> Vec<Record> {
    SEED_PEOPLE
        .iter()
        .enumerate()
        .map(|(id, (name, age))| PersonTranslator.encode(&Person::new(id as EntityId, *name, *age)))
        .collect()
}

fn eager_cache(store: &Arc<MemoryStore>) -> MemoryCache {
    let cache = Cache::new(Arc::clone(store), PersonTranslator);
    cache.init().unwrap();
    cache
}

fn lazy_cache(store: &Arc<MemoryStore>) -> MemoryCache {
    Cache::with_mode(Arc::clone(store), PersonTranslator, InitMode::Lazy)
}

fn record_events<E, P, T>(cache: &Cache<E, P, T>) -> Arc<Mutex<Vec<CacheEvent>>>
where
    E: Entity,
    P: PersistenceProvider,
    T: RecordTranslator<E>,
{
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    cache.subscribe(move |event| sink.lock().push(*event));
    events
}

#[test]
fn test_eager_single_ops() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);

    assert_eq!(cache.get(0).unwrap(), None);
    assert!(matches!(cache.update(Person::new(0, "bob", 111)), Err(Error::NotFound(0))));

    let person = Person::new(0, "bob", 333);
    cache.add(person.clone()).unwrap();
    assert_eq!(cache.get(0).unwrap(), Some(person));

    cache.update(Person::new(0, "bob", 444)).unwrap();
    assert_eq!(cache.get(0).unwrap().map(|p| p.age), Some(444));
    assert_eq!(store.get(0).unwrap().unwrap().get("Age"), Some("444"));

    cache.remove(0).unwrap();
    assert_eq!(cache.get(0).unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn test_eager_remove_missing() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    assert!(matches!(cache.remove(9), Err(Error::NotFound(9))));
}

#[test]
fn test_eager_requires_init() {
    let store = Arc::new(MemoryStore::new());
    let cache: MemoryCache = Cache::new(Arc::clone(&store), PersonTranslator);

    assert!(!cache.is_initialized());
    assert!(matches!(cache.get(0), Err(Error::NotInitialized)));
    assert!(matches!(cache.add(Person::new(0, "a", 1)), Err(Error::NotInitialized)));
    assert!(matches!(cache.update(Person::new(0, "a", 1)), Err(Error::NotInitialized)));
    assert!(matches!(cache.remove(0), Err(Error::NotInitialized)));
    assert!(matches!(cache.entities(), Err(Error::NotInitialized)));
    assert!(store.is_empty());
}

#[test]
fn test_eager_init_loads_everything() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = eager_cache(&store);

    assert_eq!(cache.len(), SEED_PEOPLE.len());
    assert_eq!(cache.get(9).unwrap(), Some(Person::new(9, "jjj", 19)));

    // The index is authoritative: records added behind the cache's back stay invisible.
    store.add(&PersonTranslator.encode(&Person::new(50, "zzz", 1))).unwrap();
    assert_eq!(cache.get(50).unwrap(), None);
}

#[test]
fn test_init_idempotent() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = eager_cache(&store);
    let first = cache.entities().unwrap();

    store.add(&PersonTranslator.encode(&Person::new(50, "zzz", 1))).unwrap();
    cache.init().unwrap();

    assert_eq!(cache.entities().unwrap(), first);
}

#[test]
fn test_init_failure_leaves_cache_uninitialized() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache: MemoryCache = Cache::new(Arc::clone(&store), PersonTranslator);

    store.set_failing(true);
    assert!(matches!(cache.init(), Err(Error::Load(_))));
    assert!(!cache.is_initialized());
    assert!(cache.is_empty());

    store.set_failing(false);
    cache.init().unwrap();
    assert_eq!(cache.len(), SEED_PEOPLE.len());
}

/// Serves a fixed record list from `get_all`, duplicates included.
struct FixedStore(Vec<Record>);

impl PersistenceProvider for FixedStore {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        Err(StoreError::Rejected(format!("read-only: {record}")))
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        Err(StoreError::Rejected(format!("read-only: {record}")))
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        Err(StoreError::Missing(id))
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        Ok(self.0.iter().find(|r| r.id().ok() == Some(id)).cloned())
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_init_rejects_duplicate_ids() {
    let records = vec![
        PersonTranslator.encode(&Person::new(1, "aaa", 10)),
        PersonTranslator.encode(&Person::new(2, "bbb", 21)),
        PersonTranslator.encode(&Person::new(1, "ccc", 22)),
    ];
    let cache: Cache<Person, _, _> = Cache::new(FixedStore(records), PersonTranslator);

    assert!(matches!(cache.init(), Err(Error::InvalidRecord(_))));
    assert!(!cache.is_initialized());
    assert!(cache.is_empty());
    assert!(matches!(cache.get(2), Err(Error::NotInitialized)));
}

#[test]
fn test_line_file_rejects_id_past_last_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = LineFileStore::open(dir.path().join("people.txt")).unwrap();
    let cache: Cache<Person, _, _> = Cache::new(store, PersonTranslator);
    cache.init().unwrap();
    let events = record_events(&cache);

    for id in [MAX_LINE_ID + 1, u64::MAX] {
        assert!(matches!(
            cache.add(Person::new(id, "x", 1)),
            Err(Error::Persistence { operation: CacheOperation::Add, id: failed, .. }) if failed == id
        ));
        assert!(!cache.contains(id));
    }
    assert!(events.lock().is_empty());
    assert_eq!(cache.provider().contents().unwrap(), "");
}

#[test]
fn test_line_file_keeps_values_across_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.txt");
    let cache: Cache<Person, _, _> = Cache::new(LineFileStore::open(&path).unwrap(), PersonTranslator);
    cache.init().unwrap();

    assert!(matches!(
        cache.add(Person::new(0, " bob ", 1)),
        Err(Error::Persistence { operation: CacheOperation::Add, id: 0, .. })
    ));
    assert_eq!(cache.get(0).unwrap(), None);

    let person = Person::new(0, "bob smith", 1);
    cache.add(person.clone()).unwrap();

    let reloaded: Cache<Person, _, _> = Cache::new(LineFileStore::open(&path).unwrap(), PersonTranslator);
    reloaded.init().unwrap();
    assert_eq!(reloaded.get(0).unwrap(), Some(person));
}

#[test]
fn test_init_rejects_undecodable_record() {
    let mut bad = Record::with_id(3);
    bad.insert("Name", "ccc");
    let store = Arc::new(MemoryStore::with_records([bad]).unwrap());
    let cache: MemoryCache = Cache::new(Arc::clone(&store), PersonTranslator);

    assert!(matches!(cache.init(), Err(Error::InvalidRecord(_))));
    assert!(!cache.is_initialized());
    assert!(cache.is_empty());
}

#[test]
fn test_add_twice_fails_in_both_modes() {
    for mode in [InitMode::Eager, InitMode::Lazy] {
        let store = Arc::new(MemoryStore::new());
        let cache: MemoryCache = Cache::with_mode(Arc::clone(&store), PersonTranslator, mode);
        cache.init().unwrap();

        cache.add(Person::new(1, "a", 1)).unwrap();
        let result = cache.add(Person::new(1, "b", 2));
        assert!(matches!(result, Err(Error::AlreadyExists(1))), "mode {mode}");
        assert_eq!(cache.get(1).unwrap().map(|p| p.name), Some("a".to_string()));
    }
}

#[test]
fn test_lazy_get() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = lazy_cache(&store);

    assert!(cache.is_empty());
    assert_eq!(cache.get(99).unwrap(), None);
    assert_eq!(cache.get(0).unwrap(), Some(Person::new(0, "aaa", 10)));
    assert!(cache.contains(0));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_lazy_value_survives_provider_outage() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = lazy_cache(&store);

    let loaded = cache.get(4).unwrap();
    store.set_failing(true);

    assert_eq!(cache.get(4).unwrap(), loaded);
    assert!(matches!(cache.get(5), Err(Error::Load(_))));
}

#[test]
fn test_lazy_existence_checks_provider() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = lazy_cache(&store);

    // Never fetched, but stored.
    assert!(matches!(cache.add(Person::new(0, "aaa", 10)), Err(Error::AlreadyExists(0))));
    assert!(matches!(cache.update(Person::new(10, "bob", 111)), Err(Error::NotFound(10))));
    assert!(matches!(cache.remove(90), Err(Error::NotFound(90))));

    cache.update(Person::new(2, "ccc", 99)).unwrap();
    assert_eq!(cache.get(2).unwrap(), Some(Person::new(2, "ccc", 99)));

    cache.remove(1).unwrap();
    assert_eq!(cache.get(1).unwrap(), None);
    assert_eq!(store.get(1).unwrap(), None);

    cache.get(3).unwrap();
    cache.get(4).unwrap();
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_lazy_init_keeps_loaded_entries() {
    let store = Arc::new(MemoryStore::with_records(seed_records()).unwrap());
    let cache = lazy_cache(&store);

    cache.get(7).unwrap();
    cache.init().unwrap();

    assert!(cache.is_initialized());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_failed_update_keeps_old_value() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let events = record_events(&cache);
    cache.add(Person::new(0, "bob", 333)).unwrap();

    store.set_failing(true);
    let result = cache.update(Person::new(0, "bob", 444));
    assert!(matches!(
        result,
        Err(Error::Persistence { operation: CacheOperation::Update, id: 0, .. })
    ));

    assert_eq!(cache.get(0).unwrap(), Some(Person::new(0, "bob", 333)));
    assert_eq!(events.lock().len(), 1);
}

#[test]
fn test_failed_add_and_remove_leave_state() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    cache.add(Person::new(0, "bob", 333)).unwrap();
    let events = record_events(&cache);

    store.set_failing(true);
    assert!(matches!(
        cache.add(Person::new(1, "a", 1)),
        Err(Error::Persistence { operation: CacheOperation::Add, id: 1, .. })
    ));
    assert!(matches!(
        cache.remove(0),
        Err(Error::Persistence { operation: CacheOperation::Remove, id: 0, .. })
    ));

    assert!(!cache.contains(1));
    assert!(cache.contains(0));
    assert!(events.lock().is_empty());

    store.set_failing(false);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_notifications_follow_completion_order() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let events = record_events(&cache);

    cache.add(Person::new(0, "a", 1)).unwrap();
    cache.add(Person::new(1, "b", 2)).unwrap();
    cache.update(Person::new(0, "a", 5)).unwrap();
    assert!(matches!(cache.update(Person::new(7, "x", 1)), Err(Error::NotFound(7))));
    cache.remove(1).unwrap();

    let expected = vec![
        CacheEvent { operation: CacheOperation::Add, id: 0 },
        CacheEvent { operation: CacheOperation::Add, id: 1 },
        CacheEvent { operation: CacheOperation::Update, id: 0 },
        CacheEvent { operation: CacheOperation::Remove, id: 1 },
    ];
    assert_eq!(*events.lock(), expected);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = cache.subscribe(move |event| sink.lock().push(*event));

    cache.add(Person::new(0, "a", 1)).unwrap();
    assert!(cache.unsubscribe(subscription));
    cache.add(Person::new(1, "b", 1)).unwrap();

    assert_eq!(events.lock().len(), 1);
    assert!(!cache.unsubscribe(subscription));
}

#[test]
fn test_notification_delivered_before_return() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    let probe = Arc::clone(&store);
    // The provider already holds the record by the time observers run.
    cache.subscribe(move |event| *sink.lock() = Some(probe.get(event.id).unwrap().is_some()));

    cache.add(Person::new(3, "c", 3)).unwrap();
    assert_eq!(*observed.lock(), Some(true));
}

#[test]
fn test_round_trip_many() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let people: Vec<Person> = (0..10u8)
        .map(|i| Person::new(i.into(), char::from(b'a' + i).to_string().repeat(3), u32::from(i) + 10))
        .collect();

    for person in &people {
        cache.add(person.clone()).unwrap();
    }
    for person in people.iter().rev() {
        assert_eq!(cache.get(person.id).unwrap().as_ref(), Some(person));
    }

    for id in [3, 7, 1] {
        let mut person = people[id].clone();
        person.age += 10;
        cache.update(person.clone()).unwrap();
        assert_eq!(cache.get(person.id).unwrap(), Some(person));
    }

    for id in [0, 4, 9, 2, 5] {
        assert!(cache.get(id).unwrap().is_some());
        cache.remove(id).unwrap();
        assert_eq!(cache.get(id).unwrap(), None);
    }
    assert_eq!(cache.entities().unwrap().iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3, 6, 7, 8]);
}

#[test]
fn test_concurrent_disjoint_mutations() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 25;

    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(eager_cache(&store));
    let events = record_events(&cache);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let base = t * 100;
                for i in 0..PER_THREAD {
                    cache.add(Person::new(base + i, format!("t{t}"), 0)).unwrap();
                }
                for i in (0..PER_THREAD).step_by(2) {
                    cache.update(Person::new(base + i, format!("t{t}"), 1)).unwrap();
                    assert_eq!(cache.get(base + i).unwrap().map(|p| p.age), Some(1));
                }
                for i in (0..PER_THREAD).step_by(5) {
                    cache.remove(base + i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut expected = Vec::new();
    for t in 0..THREADS {
        for i in (0..PER_THREAD).filter(|i| i % 5 != 0) {
            let age = if i % 2 == 0 { 1 } else { 0 };
            expected.push(Person::new(t * 100 + i, format!("t{t}"), age));
        }
    }
    assert_eq!(cache.entities().unwrap(), expected);

    let stored: Vec<Person> = store
        .get_all()
        .unwrap()
        .iter()
        .map(|r| PersonTranslator.decode(r).unwrap())
        .collect();
    assert_eq!(stored, expected);

    let adds = PER_THREAD * THREADS;
    let updates = PER_THREAD.div_ceil(2) * THREADS;
    let removes = PER_THREAD.div_ceil(5) * THREADS;
    assert_eq!(events.lock().len() as u64, adds + updates + removes);
}

#[test]
fn test_threads_over_line_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LineFileStore::open(dir.path().join("people.txt")).unwrap());
    store.seed_people().unwrap();
    let cache: Arc<Cache<Person, _, _>> = Arc::new(Cache::new(Arc::clone(&store), PersonTranslator));
    cache.init().unwrap();

    let workloads: [[EntityId; 3]; 4] = [[0, 1, 9], [2, 1, 8], [3, 2, 7], [5, 4, 6]];
    let handles: Vec<_> = workloads
        .into_iter()
        .map(|ids| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache.update(Person::new(ids[0], "Thread", 0)).unwrap();
                cache.get(ids[1]).unwrap();
                cache.update(Person::new(ids[1], "Thread", 0)).unwrap();

                assert_eq!(cache.get(ids[0]).unwrap().unwrap().name, "Thread");
                assert_eq!(cache.get(ids[1]).unwrap().unwrap().name, "Thread");

                cache.remove(ids[2]).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = ["Age,0,Name,Thread"; 6].join("\n");
    assert_eq!(store.contents().unwrap().trim(), expected);
    assert_eq!(cache.len(), 6);
}

#[test]
fn test_debug_output() {
    let store = Arc::new(MemoryStore::new());
    let cache = eager_cache(&store);
    let debug = format!("{cache:?}");
    assert!(debug.contains("initialized: true"));
    assert!(debug.contains("Eager"));
}
