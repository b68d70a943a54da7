use speculate2::speculate;

speculate! {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use threadline_core::models::*;
    use threadline_core::{Engine, EngineError, Filter, ManualClock, MemoryStore, RecordStore};
    use tokio_test::block_on;

    fn setup_engine() -> Engine<MemoryStore> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        Engine::new(MemoryStore::new()).with_clock(Arc::new(clock))
    }

    fn create_persona(engine: &mut Engine<MemoryStore>, name: &str) -> Persona {
        block_on(engine.add(Persona::new("u1", name))).expect("Failed to add persona")
    }

    fn create_problem(engine: &mut Engine<MemoryStore>, persona_id: &str, title: &str) -> Problem {
        block_on(engine.add(Problem::new(title).under_persona(persona_id)))
            .expect("Failed to add problem")
    }

    fn create_thread(engine: &mut Engine<MemoryStore>, problem_id: &str, parent_id: Option<&str>) -> ThreadItem {
        let mut item = ThreadItem::new(problem_id, ThreadType::General, "note");
        if let Some(parent_id) = parent_id {
            item = item.reply_to(parent_id);
        }
        block_on(engine.add(item)).expect("Failed to add thread item")
    }

    fn stored_rows(engine: &Engine<MemoryStore>, kind: EntityKind) -> usize {
        block_on(engine.store().rows(kind)).len()
    }

    describe "adding entities" {
        it "links a problem into its persona in cache and store" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");

            let cached = engine.get::<Persona>(&persona.id).unwrap();
            assert_eq!(cached.problem_ids, vec![problem.id.clone()]);

            let rows = block_on(
                engine
                    .store()
                    .select(EntityKind::Persona, &Filter::id(persona.id.clone())),
            )
            .unwrap();
            assert_eq!(rows[0]["problem_ids"], json!([problem.id]));
        }

        it "links root items to the problem and replies to their parent item" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let root = create_thread(&mut engine, &problem.id, None);
            let reply = create_thread(&mut engine, &problem.id, Some(&root.id));

            let problem = engine.get::<Problem>(&problem.id).unwrap();
            assert_eq!(problem.child_thread_ids, vec![root.id.clone()]);

            let root = engine.get::<ThreadItem>(&root.id).unwrap();
            assert_eq!(root.child_thread_ids, vec![reply.id.clone()]);
        }

        it "links single-id slots" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let project = block_on(engine.add(Project::for_problem(&problem.id, "Cache layer"))).unwrap();
            let report = block_on(engine.add(StarReport::for_problem(&problem.id))).unwrap();

            let problem = engine.get::<Problem>(&problem.id).unwrap();
            assert_eq!(problem.project_id.as_deref(), Some(project.id.as_str()));
            assert_eq!(problem.star_report_id.as_deref(), Some(report.id.as_str()));
        }

        it "rejects a second project for the same problem" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let first = block_on(engine.add(Project::for_problem(&problem.id, "Cache layer"))).unwrap();

            let result = block_on(engine.add(Project::for_problem(&problem.id, "Rewrite")));
            assert!(matches!(result, Err(EngineError::SlotOccupied { field: "project_id", .. })));

            assert_eq!(stored_rows(&engine, EntityKind::Project), 1);
            assert_eq!(engine.all::<Project>().len(), 1);
            let problem = engine.get::<Problem>(&problem.id).unwrap().clone();
            assert_eq!(problem.project_id.as_deref(), Some(first.id.as_str()));

            let removed = block_on(engine.delete::<Problem>(&problem.id)).unwrap();
            assert_eq!(removed, 2);
            assert_eq!(stored_rows(&engine, EntityKind::Project), 0);
        }

        it "replaces the linked report with a newer one" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            block_on(engine.add(StarReport::for_problem(&problem.id))).unwrap();
            let newer = block_on(engine.add(StarReport::for_problem(&problem.id))).unwrap();

            let problem = engine.get::<Problem>(&problem.id).unwrap();
            assert_eq!(problem.star_report_id.as_deref(), Some(newer.id.as_str()));
        }

        it "ignores child ids supplied by the caller" {
            let mut engine = setup_engine();
            let mut problem = Problem::new("Loose");
            problem.child_problem_ids = vec!["bogus".into()];
            let problem = block_on(engine.add(problem)).unwrap();
            assert!(problem.child_problem_ids.is_empty());
        }

        it "succeeds when the parent is missing" {
            let mut engine = setup_engine();
            let problem = block_on(engine.add(Problem::new("Orphan").under_persona("ghost"))).unwrap();
            assert!(engine.get::<Problem>(&problem.id).is_some());
        }

        it "attributes thread items to the author" {
            let mut engine = setup_engine().with_author("u1");
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let item = create_thread(&mut engine, &problem.id, None);
            assert_eq!(item.author_id, "u1");
        }
    }

    describe "updating parent pointers" {
        it "refuses to move a project onto a problem that has one" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let a = create_problem(&mut engine, &persona.id, "A");
            let b = create_problem(&mut engine, &persona.id, "B");
            let kept = block_on(engine.add(Project::for_problem(&a.id, "Kept"))).unwrap();
            let moving = block_on(engine.add(Project::for_problem(&b.id, "Moving"))).unwrap();

            let target = a.id.clone();
            let result = block_on(engine.update_with::<Project, _>(&moving.id, |p| p.problem_id = Some(target)));
            assert!(matches!(result, Err(EngineError::SlotOccupied { .. })));

            assert_eq!(engine.get::<Problem>(&a.id).unwrap().project_id.as_deref(), Some(kept.id.as_str()));
            assert_eq!(engine.get::<Problem>(&b.id).unwrap().project_id.as_deref(), Some(moving.id.as_str()));
            assert_eq!(engine.get::<Project>(&moving.id).unwrap().problem_id.as_deref(), Some(b.id.as_str()));
            let stored = block_on(engine.store().rows(EntityKind::Problem));
            let b_row = stored.iter().find(|r| r["id"] == json!(b.id)).unwrap();
            assert_eq!(b_row["project_id"], json!(moving.id));
        }

        it "moves a problem between personas" {
            let mut engine = setup_engine();
            let a = create_persona(&mut engine, "A");
            let b = create_persona(&mut engine, "B");
            let problem = create_problem(&mut engine, &a.id, "Drifting");

            let b_id = b.id.clone();
            block_on(engine.update_with::<Problem, _>(&problem.id, |p| p.persona_id = Some(b_id)))
                .unwrap();

            assert!(engine.get::<Persona>(&a.id).unwrap().problem_ids.is_empty());
            assert_eq!(engine.get::<Persona>(&b.id).unwrap().problem_ids, vec![problem.id.clone()]);
        }

        it "moves a nested problem out to the persona" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "A");
            let parent = create_problem(&mut engine, &persona.id, "Parent");
            let child = block_on(engine.add(
                Problem::new("Child").under_persona(&persona.id).under_problem(&parent.id),
            ))
            .unwrap();
            assert_eq!(engine.get::<Persona>(&persona.id).unwrap().problem_ids, vec![parent.id.clone()]);

            block_on(engine.update_with::<Problem, _>(&child.id, |p| p.parent_id = None)).unwrap();

            assert!(engine.get::<Problem>(&parent.id).unwrap().child_problem_ids.is_empty());
            assert_eq!(engine.get::<Persona>(&persona.id).unwrap().problem_ids.len(), 2);
        }

        it "keeps child lists from the cache over a stale copy" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "A");
            let mut stale = create_problem(&mut engine, &persona.id, "Old title");
            let root = create_thread(&mut engine, &stale.id, None);

            stale.title = "New title".into();
            let updated = block_on(engine.update(stale)).unwrap();

            assert_eq!(updated.title, "New title");
            assert_eq!(updated.child_thread_ids, vec![root.id]);
        }

        it "rejects ids that are not cached" {
            let mut engine = setup_engine();
            let result = block_on(engine.update(Problem::new("Nowhere")));
            assert!(matches!(result, Err(EngineError::NotFound { kind: EntityKind::Problem, .. })));
        }
    }

    describe "cascade deletion" {
        it "removes a problem with a deep thread tree and everything it owns" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let t1 = create_thread(&mut engine, &problem.id, None);
            let t2 = create_thread(&mut engine, &problem.id, Some(&t1.id));
            let t3 = create_thread(&mut engine, &problem.id, Some(&t2.id));
            let t4 = create_thread(&mut engine, &problem.id, Some(&t3.id));
            block_on(engine.add(ThreadResult::new(&t3.id, "Found it"))).unwrap();
            let project = block_on(engine.add(Project::for_problem(&problem.id, "Fix"))).unwrap();
            block_on(engine.add(Task::new(&project.id, "Profile"))).unwrap();
            block_on(engine.add(DoItem::new(&project.id, "Measure first"))).unwrap();
            block_on(engine.add(StarReport::for_problem(&problem.id))).unwrap();

            let removed = block_on(engine.delete::<Problem>(&problem.id)).unwrap();
            assert_eq!(removed, 10);

            for kind in [
                EntityKind::Problem,
                EntityKind::ThreadItem,
                EntityKind::ThreadResult,
                EntityKind::Project,
                EntityKind::Task,
                EntityKind::DoItem,
                EntityKind::StarReport,
            ] {
                assert_eq!(stored_rows(&engine, kind), 0, "{} rows left", kind);
            }
            assert!(engine.get::<ThreadItem>(&t4.id).is_none());
            assert!(engine.all::<ThreadItem>().is_empty());
            assert!(engine.get::<Persona>(&persona.id).unwrap().problem_ids.is_empty());
        }

        it "removes a nested item and unlinks it from its parent item" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let t1 = create_thread(&mut engine, &problem.id, None);
            let t2 = create_thread(&mut engine, &problem.id, Some(&t1.id));
            create_thread(&mut engine, &problem.id, Some(&t2.id));

            let removed = block_on(engine.delete::<ThreadItem>(&t2.id)).unwrap();

            assert_eq!(removed, 2);
            assert!(engine.get::<ThreadItem>(&t1.id).unwrap().child_thread_ids.is_empty());
            assert_eq!(engine.get::<Problem>(&problem.id).unwrap().child_thread_ids, vec![t1.id]);
        }

        it "removes nested problems" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let p1 = create_problem(&mut engine, &persona.id, "Top");
            let p2 = block_on(engine.add(Problem::new("Mid").under_problem(&p1.id))).unwrap();
            block_on(engine.add(Problem::new("Leaf").under_problem(&p2.id))).unwrap();

            assert_eq!(block_on(engine.delete::<Problem>(&p1.id)).unwrap(), 3);
            assert!(engine.all::<Problem>().is_empty());
        }

        it "finds rows missing from a drifted child list" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let problem = create_problem(&mut engine, &persona.id, "Slow builds");
            let stray = ThreadItem::new(&problem.id, ThreadType::Insight, "written elsewhere");
            block_on(engine.store().insert(EntityKind::ThreadItem, stray.to_record().unwrap())).unwrap();

            block_on(engine.delete::<Problem>(&problem.id)).unwrap();
            assert_eq!(stored_rows(&engine, EntityKind::ThreadItem), 0);
        }

        it "spares a thread subtree that moved to another problem" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let old = create_problem(&mut engine, &persona.id, "Old home");
            let new = create_problem(&mut engine, &persona.id, "New home");
            let root = create_thread(&mut engine, &old.id, None);
            let reply = create_thread(&mut engine, &old.id, Some(&root.id));

            let new_id = new.id.clone();
            block_on(engine.update_with::<ThreadItem, _>(&root.id, |i| i.problem_id = new_id)).unwrap();
            let removed = block_on(engine.delete::<Problem>(&old.id)).unwrap();

            assert_eq!(removed, 1);
            assert_eq!(engine.get::<Problem>(&new.id).unwrap().child_thread_ids, vec![root.id.clone()]);
            assert_eq!(engine.get::<ThreadItem>(&root.id).unwrap().child_thread_ids, vec![reply.id.clone()]);
            assert!(engine.get::<ThreadItem>(&reply.id).is_some());
            assert_eq!(stored_rows(&engine, EntityKind::ThreadItem), 2);
        }

        it "spares nested problems whose parent moved to another persona" {
            let mut engine = setup_engine();
            let a = create_persona(&mut engine, "A");
            let b = create_persona(&mut engine, "B");
            let parent = create_problem(&mut engine, &a.id, "Parent");
            let child = block_on(engine.add(
                Problem::new("Child").under_persona(&a.id).under_problem(&parent.id),
            ))
            .unwrap();

            let b_id = b.id.clone();
            block_on(engine.update_with::<Problem, _>(&parent.id, |p| p.persona_id = Some(b_id))).unwrap();
            let removed = block_on(engine.delete::<Persona>(&a.id)).unwrap();

            assert_eq!(removed, 1);
            assert_eq!(engine.get::<Persona>(&b.id).unwrap().problem_ids, vec![parent.id.clone()]);
            assert_eq!(engine.get::<Problem>(&parent.id).unwrap().child_problem_ids, vec![child.id.clone()]);
            assert!(engine.get::<Problem>(&child.id).is_some());
            assert_eq!(stored_rows(&engine, EntityKind::Problem), 2);
        }

        it "terminates on a corrupted cycle" {
            let mut engine = setup_engine();
            let persona = create_persona(&mut engine, "Engineer");
            let a = create_problem(&mut engine, &persona.id, "A");
            let b = block_on(engine.add(Problem::new("B").under_problem(&a.id))).unwrap();

            let mut corrupt = engine.get::<Problem>(&b.id).unwrap().to_record().unwrap();
            corrupt.insert("child_problem_ids".into(), json!([a.id]));
            block_on(engine.store().update(EntityKind::Problem, corrupt)).unwrap();

            assert_eq!(block_on(engine.delete::<Problem>(&a.id)).unwrap(), 2);
            assert_eq!(stored_rows(&engine, EntityKind::Problem), 0);
        }

        it "deletes locked entities" {
            let mut engine = setup_engine();
            let project = block_on(engine.add(Project::for_problem("p", "Solo"))).unwrap();
            let task = block_on(engine.add(Task::new(&project.id, "Frozen"))).unwrap();
            block_on(engine.set_locked::<Task>(&task.id, true)).unwrap();

            assert_eq!(block_on(engine.delete::<Task>(&task.id)).unwrap(), 1);
            assert!(engine.get::<Project>(&project.id).unwrap().task_ids.is_empty());
        }

        it "reports unknown ids" {
            let mut engine = setup_engine();
            let result = block_on(engine.delete::<Problem>("missing"));
            assert!(matches!(result, Err(EngineError::NotFound { .. })));
        }
    }

    describe "bidirectional linkage" {
        it "holds after a mixed sequence of operations" {
            let mut engine = setup_engine();
            let a = create_persona(&mut engine, "A");
            let b = create_persona(&mut engine, "B");
            let p1 = create_problem(&mut engine, &a.id, "One");
            let p2 = create_problem(&mut engine, &a.id, "Two");
            let p3 = create_problem(&mut engine, &b.id, "Three");
            let b_id = b.id.clone();
            block_on(engine.update_with::<Problem, _>(&p1.id, |p| p.persona_id = Some(b_id))).unwrap();
            block_on(engine.delete::<Problem>(&p3.id)).unwrap();
            let t1 = create_thread(&mut engine, &p2.id, None);
            create_thread(&mut engine, &p2.id, Some(&t1.id));

            for persona in engine.all::<Persona>().iter() {
                for problem in engine.all::<Problem>().iter() {
                    let listed = persona.problem_ids.contains(&problem.id);
                    let points = problem.persona_id.as_deref() == Some(persona.id.as_str());
                    assert_eq!(listed, points, "{} / {}", persona.name, problem.title);
                }
            }
            for item in engine.all::<ThreadItem>().iter() {
                let listed_by_problem = engine
                    .get::<Problem>(&item.problem_id)
                    .unwrap()
                    .child_thread_ids
                    .contains(&item.id);
                assert_eq!(listed_by_problem, item.parent_id.is_none());
                if let Some(parent_id) = &item.parent_id {
                    let parent = engine.get::<ThreadItem>(parent_id).unwrap();
                    assert!(parent.child_thread_ids.contains(&item.id));
                }
            }
        }
    }
}
