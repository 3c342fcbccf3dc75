/// Demo glossary loaded at startup when `GLOSSARY_SEED` is set.
pub const DEMO_TERMS: &[(&str, &str)] = &[
    ("API", "Application Programming Interface - set of protocols for building software"),
    ("REST", "Representational State Transfer - architectural style for distributed systems"),
    ("gRPC", "Google Remote Procedure Call - high performance RPC framework"),
    ("HTTP", "HyperText Transfer Protocol - application layer protocol for data transfer"),
    ("JSON", "JavaScript Object Notation - lightweight data interchange format"),
    ("SQL", "Structured Query Language - language for managing relational databases"),
    ("TCP", "Transmission Control Protocol - reliable connection-oriented protocol"),
    ("UDP", "User Datagram Protocol - connectionless transport protocol"),
    ("DNS", "Domain Name System - hierarchical naming system for computers"),
    ("TLS", "Transport Layer Security - successor to SSL for encryption"),
    ("JWT", "JSON Web Token - compact URL-safe means of representing claims"),
    ("CORS", "Cross-Origin Resource Sharing - mechanism for cross-domain requests"),
    ("Protobuf", "Protocol Buffers - language-neutral data serialization format"),
    ("WebSocket", "Protocol providing full-duplex communication channels"),
    ("Cache", "Hardware or software component storing data for faster access"),
    ("Latency", "Time delay between cause and effect in a system"),
    ("Throughput", "Amount of data processed in a given time period"),
    ("Replication", "Sharing information across redundant resources"),
    ("Sharding", "Database partitioning separating large databases"),
    ("Fault Tolerance", "System ability to continue operating after failures"),
];
