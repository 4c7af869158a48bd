//! Shared fixtures for integration tests

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Caret file of the Java fixture, relative to its root
pub const SERVICE: &str = "src/app/Service.java";

/// Cursor right after `repo.find(k` in [`SERVICE`]
pub const CURSOR: (usize, usize) = (9, 22);

/// A small Java project: a service calling a repository method, the types
/// that method mentions, and one other caller of it.
pub fn make_java_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/app/model/User.java")
        .write_str("package app.model;\n\npublic class User {\n  String name;\n}\n")
        .expect("write User.java");

    tmp.child("src/app/store/Key.java")
        .write_str("package app.store;\n\npublic class Key {\n  int id;\n}\n")
        .expect("write Key.java");

    tmp.child("src/app/store/Repo.java")
        .write_str(
            "package app.store;\n\
             \n\
             import app.model.User;\n\
             \n\
             public class Repo {\n\
             \x20 public User find(Key key) {\n\
             \x20   return null;\n\
             \x20 }\n\
             }\n",
        )
        .expect("write Repo.java");

    tmp.child("src/app/Audit.java")
        .write_str(
            "package app;\n\
             \n\
             public class Audit {\n\
             \x20 void check(Repo repo) {\n\
             \x20   repo.find(null);\n\
             \x20 }\n\
             }\n",
        )
        .expect("write Audit.java");

    tmp.child(SERVICE)
        .write_str(
            "package app;\n\
             \n\
             import app.model.User;\n\
             import app.store.Repo;\n\
             \n\
             public class Service {\n\
             \x20 private Repo repo;\n\
             \n\
             \x20 User load(Key k) {\n\
             \x20   return repo.find(k);\n\
             \x20 }\n\
             }\n",
        )
        .expect("write Service.java");

    // Ignored by .gitignore; must never show up in results
    tmp.child(".gitignore").write_str("generated/\n").expect("write .gitignore");
    tmp.child("generated/Repo.java")
        .write_str("public class Repo { public User find(Key key) { return null; } }\n")
        .expect("write generated");

    tmp
}
