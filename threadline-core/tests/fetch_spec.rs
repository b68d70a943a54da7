use speculate2::speculate;

speculate! {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;
    use threadline_core::models::*;
    use threadline_core::{Engine, Filter, MemoryStore, Record, RecordStore};
    use tokio_test::block_on;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn problem(id: &str, persona: &str, minutes: i64) -> Problem {
        let mut p = Problem::new(id).under_persona(persona);
        p.id = id.to_string();
        p.created_at = at(minutes);
        p
    }

    fn seed(store: &MemoryStore, kind: EntityKind, record: Record) {
        block_on(store.insert(kind, record)).expect("Failed to seed row");
    }

    fn seeded_engine() -> Engine<MemoryStore> {
        let store = MemoryStore::new();
        for (id, persona, minutes) in [("a1", "A", 0), ("a2", "A", 1), ("b1", "B", 2)] {
            seed(&store, EntityKind::Problem, problem(id, persona, minutes).to_record().unwrap());
        }
        Engine::new(store)
    }

    fn cached_ids(engine: &Engine<MemoryStore>) -> Vec<String> {
        engine.all::<Problem>().iter().map(|p| p.id.clone()).collect()
    }

    describe "partition merge" {
        it "loads only the requested partition" {
            let mut engine = seeded_engine();
            let stats = block_on(engine.fetch::<Problem>(Filter::eq("persona_id", "A"))).unwrap();
            assert_eq!(stats.fetched, 2);
            assert_eq!(cached_ids(&engine), vec!["a2", "a1"]);
        }

        it "keeps earlier partitions when fetching a disjoint one" {
            let mut engine = seeded_engine();
            block_on(engine.fetch::<Problem>(Filter::eq("persona_id", "A"))).unwrap();
            block_on(engine.fetch::<Problem>(Filter::eq("persona_id", "B"))).unwrap();
            assert_eq!(cached_ids(&engine), vec!["b1", "a2", "a1"]);
        }

        it "drops rows deleted from the partition and nothing else" {
            let mut engine = seeded_engine();
            block_on(engine.fetch::<Problem>(Filter::All)).unwrap();
            block_on(engine.store().delete(EntityKind::Problem, &["a2".to_string()])).unwrap();

            let stats = block_on(engine.fetch::<Problem>(Filter::eq("persona_id", "A"))).unwrap();

            assert_eq!(stats.dropped, 1);
            assert_eq!(cached_ids(&engine), vec!["b1", "a1"]);
        }

        it "replaces stale cached values" {
            let mut engine = seeded_engine();
            block_on(engine.fetch::<Problem>(Filter::All)).unwrap();
            let mut renamed = problem("a1", "A", 0);
            renamed.title = "Renamed".into();
            block_on(engine.store().update(EntityKind::Problem, renamed.to_record().unwrap())).unwrap();

            block_on(engine.fetch::<Problem>(Filter::id("a1"))).unwrap();

            assert_eq!(engine.get::<Problem>("a1").unwrap().title, "Renamed");
            assert_eq!(engine.all::<Problem>().len(), 3);
        }

        it "skips rows that cannot be decoded" {
            let mut engine = seeded_engine();
            let broken: Record = serde_json::from_value(json!({"id": "bad", "persona_id": "A"})).unwrap();
            seed(engine.store(), EntityKind::Problem, broken);

            let stats = block_on(engine.fetch::<Problem>(Filter::eq("persona_id", "A"))).unwrap();

            assert_eq!(stats.fetched, 2);
            assert!(engine.get::<Problem>("bad").is_none());
        }
    }

    describe "canonical order" {
        it "sorts personas by explicit order then creation time" {
            let store = MemoryStore::new();
            for (id, order, minutes) in [("late", 1, 5), ("first", 0, 9), ("early", 1, 2)] {
                let mut persona = Persona::new("u1", id).with_order(order);
                persona.id = id.to_string();
                persona.created_at = at(minutes);
                seed(&store, EntityKind::Persona, persona.to_record().unwrap());
            }
            let mut engine = Engine::new(store);
            block_on(engine.fetch::<Persona>(Filter::All)).unwrap();

            let ids: Vec<&str> = engine.all::<Persona>().iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["first", "early", "late"]);
        }

        it "sorts thread items oldest first" {
            let store = MemoryStore::new();
            for (id, minutes) in [("second", 3), ("first", 1)] {
                let mut item = ThreadItem::new("p1", ThreadType::General, id);
                item.id = id.to_string();
                item.created_at = at(minutes);
                seed(&store, EntityKind::ThreadItem, item.to_record().unwrap());
            }
            let mut engine = Engine::new(store);
            block_on(engine.fetch::<ThreadItem>(Filter::eq("problem_id", "p1"))).unwrap();

            let ids: Vec<&str> = engine.all::<ThreadItem>().iter().map(|t| t.id.as_str()).collect();
            assert_eq!(ids, vec!["first", "second"]);
        }
    }

    describe "thread item variants" {
        it "falls back to General for unknown types" {
            let store = MemoryStore::new();
            let row: Record = serde_json::from_value(json!({
                "id": "t1",
                "problem_id": "p1",
                "type": "Poll",
                "content": "from a newer client",
                "created_at": "2024-01-01T00:00:00Z",
            }))
            .unwrap();
            seed(&store, EntityKind::ThreadItem, row);
            let mut engine = Engine::new(store);

            block_on(engine.fetch::<ThreadItem>(Filter::All)).unwrap();

            let item = engine.get::<ThreadItem>("t1").unwrap();
            assert_eq!(item.kind, ThreadKind::General);
            assert_eq!(item.content, "from a newer client");
        }

        it "fills defaults for absent variant fields" {
            let store = MemoryStore::new();
            let row: Record = serde_json::from_value(json!({
                "id": "t1",
                "problem_id": "p1",
                "type": "Action",
                "content": "ship it",
                "created_at": "2024-01-01T00:00:00Z",
            }))
            .unwrap();
            seed(&store, EntityKind::ThreadItem, row);
            let mut engine = Engine::new(store);

            block_on(engine.fetch::<ThreadItem>(Filter::All)).unwrap();

            assert_eq!(
                engine.get::<ThreadItem>("t1").unwrap().kind,
                ThreadKind::Action {
                    status: ActionStatus::Todo,
                    time_spent: 0,
                    deadline: None,
                    completed_at: None,
                }
            );
        }
    }
}
