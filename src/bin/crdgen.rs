use cassandra_k8s::crd::{CassandraBackup, CassandraCluster};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&CassandraCluster::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&CassandraBackup::crd())?);
    Ok(())
}
