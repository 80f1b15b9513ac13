use crate::common::{path, project};
use kt_patcher::{ElementKind, InsertPosition, Modification};
use std::thread;

#[test]
fn concurrent_writers_are_serialized() {
    let (_dir, repo) = project(&[("Registry.kt", "object Registry {\n}\n")]);
    let registry = path("file:Registry.kt/object[Registry]");

    thread::scope(|scope| {
        for worker in 0..4 {
            let repo = &repo;
            let registry = registry.clone();
            scope.spawn(move || {
                for i in 0..5 {
                    let result = repo.apply_modification(Modification::CreateElement {
                        target_path: registry.clone(),
                        kind: ElementKind::Property,
                        content: format!("val w{worker}_{i} = {i}"),
                        position: InsertPosition::LastChild,
                    });
                    assert!(result.is_success(), "{result:?}");
                }
            });
        }
    });

    let children = repo.find_elements(&registry, Some(ElementKind::Property), None).unwrap();
    assert_eq!(children.len(), 20);
    for worker in 0..4 {
        for i in 0..5 {
            assert!(repo.exists(&registry.child(kt_patcher::Segment::new(
                ElementKind::Property,
                format!("w{worker}_{i}"),
            ))));
        }
    }
}

#[test]
fn readers_see_committed_states_only() {
    let (_dir, repo) = project(&[("A.kt", "class A {\n    fun a() = 1\n}\n")]);
    let target = path("file:A.kt/class[A]/function[a]");

    thread::scope(|scope| {
        scope.spawn(|| {
            for n in 2..20 {
                let result = repo.apply_modification(Modification::ReplaceElement {
                    target_path: target.clone(),
                    content: format!("fun a() = {n}"),
                });
                assert!(result.is_success(), "{result:?}");
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                let snapshot = repo.get_element(&target).unwrap();
                assert!(snapshot.content.starts_with("fun a() = "));
            }
        });
    });

    assert_eq!(repo.get_element(&target).unwrap().content, "fun a() = 19");
}
