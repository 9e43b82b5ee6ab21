#[remote_ci_test::test(git)]
fn git_required() -> Result<(), String> {
  let status = std::process::Command::new("git")
    .arg("--version")
    .status()
    .map_err(|err| err.to_string())?;

  assert!(status.success());

  Ok(())
}

#[remote_ci_test::test]
async fn async_test() -> Result<(), ()> {
  log::info!("async test");
  log::trace!("logger is installed at trace level");

  Ok(())
}
